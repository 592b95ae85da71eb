//! Connection cache keyed by endpoint and a fingerprint of the credential.
//!
//! Each entry holds a shared establishment future, so concurrent callers for the same key
//! await one connect attempt. By default entries live as long as the pool, and a failed
//! establishment stays cached until [`SessionPool::invalidate`] or [`SessionPool::clear`].

use futures_util::future::{BoxFuture, FutureExt, Shared};
use primesearch_core::{Connector, Result, SessionHandle};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

type SessionFuture = Shared<BoxFuture<'static, Result<SessionHandle>>>;

/// Lifetime policy for pooled sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Entries older than this are re-established on next acquire.
    pub ttl: Option<Duration>,
    /// Drop an entry as soon as its establishment fails.
    pub evict_failed: bool,
}

impl CachePolicy {
    fn is_expired(&self, created: Instant) -> bool {
        self.ttl.is_some_and(|ttl| created.elapsed() >= ttl)
    }
}

/// A borrowed session plus whether it came out of the cache.
#[derive(Clone)]
pub struct Acquired {
    pub session: SessionHandle,
    pub cache_hit: bool,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    endpoint: String,
    fingerprint: String,
}

impl PoolKey {
    fn new(endpoint: &str, credential: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            fingerprint: fingerprint(credential),
        }
    }
}

struct Entry {
    id: u64,
    created: Instant,
    session: SessionFuture,
}

/// Short, stable, non-reversible token. Only ever used as part of a map key.
fn fingerprint(credential: &str) -> String {
    let mut h = Sha256::new();
    h.update(b"credential:");
    h.update(credential.as_bytes());
    let digest = hex::encode(h.finalize());
    digest[..16].to_string()
}

/// Caller headers first, then `Authorization`, which replaces any caller-supplied value
/// regardless of case.
pub fn merge_headers(
    credential: &str,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = extra
        .iter()
        .filter(|(k, _)| !k.trim().eq_ignore_ascii_case("authorization"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    out.insert("Authorization".to_string(), format!("Bearer {credential}"));
    out
}

pub struct SessionPool {
    connector: Arc<dyn Connector>,
    policy: CachePolicy,
    entries: Mutex<HashMap<PoolKey, Entry>>,
    next_id: AtomicU64,
}

impl SessionPool {
    pub fn new(connector: Arc<dyn Connector>, policy: CachePolicy) -> Self {
        Self {
            connector,
            policy,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PoolKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get a session for `endpoint`. With `reuse == false` a fresh session is established
    /// and never stored.
    pub async fn acquire(
        &self,
        endpoint: &str,
        credential: &str,
        extra_headers: &BTreeMap<String, String>,
        reuse: bool,
    ) -> Result<Acquired> {
        let headers = merge_headers(credential, extra_headers);
        if !reuse {
            tracing::debug!(endpoint, "establishing unpooled session");
            let session = self.connector.connect(endpoint, &headers).await?;
            return Ok(Acquired {
                session,
                cache_hit: false,
            });
        }

        let key = PoolKey::new(endpoint, credential);
        // Check-then-insert happens under one lock; the future is awaited after release.
        let (id, pending, cache_hit) = {
            let mut entries = self.entries();
            let live = entries
                .get(&key)
                // A pending establishment is never expired; waiters keep sharing it.
                .filter(|e| e.session.peek().is_none() || !self.policy.is_expired(e.created))
                .map(|e| (e.id, e.session.clone()));
            match live {
                Some((id, pending)) => (id, pending, true),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let connector = Arc::clone(&self.connector);
                    let target = endpoint.to_string();
                    let pending = async move { connector.connect(&target, &headers).await }
                        .boxed()
                        .shared();
                    entries.insert(
                        key.clone(),
                        Entry {
                            id,
                            created: Instant::now(),
                            session: pending.clone(),
                        },
                    );
                    (id, pending, false)
                }
            }
        };
        tracing::debug!(endpoint, cache_hit, "acquiring pooled session");

        match pending.await {
            Ok(session) => Ok(Acquired { session, cache_hit }),
            Err(e) => {
                if self.policy.evict_failed {
                    self.remove_if_current(&key, id);
                }
                Err(e)
            }
        }
    }

    fn remove_if_current(&self, key: &PoolKey, id: u64) {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|e| e.id == id) {
            entries.remove(key);
        }
    }

    /// Forget the entry for this endpoint/credential pair. Returns whether one existed.
    pub fn invalidate(&self, endpoint: &str, credential: &str) -> bool {
        self.entries()
            .remove(&PoolKey::new(endpoint, credential))
            .is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
