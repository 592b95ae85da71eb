use crate::config::ClientConfig;
use crate::normalize::normalize;
use crate::pool::SessionPool;
use crate::rmcp_transport::RmcpConnector;
use crate::unwrap::extract_records;
use primesearch_core::{
    Connector, Error, Result, SearchMeta, SearchOptions, SearchOutcome, SearchParams,
    SessionHandle, ToolReply, ToolUnavailableReason,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Search entry point: credential gate, pooled session, remote call, unwrap, normalise.
pub struct SearchClient {
    config: ClientConfig,
    pool: SessionPool,
}

impl SearchClient {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let pool = SessionPool::new(connector, config.cache_policy);
        Self { config, pool }
    }

    /// Client backed by the streamable-HTTP MCP transport.
    pub fn with_rmcp(config: ClientConfig) -> Self {
        Self::new(config, Arc::new(RmcpConnector::default()))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    fn credential(&self, opts: &SearchOptions) -> Result<String> {
        opts.api_key
            .as_deref()
            .or(self.config.api_key.as_deref())
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or(Error::MissingCredential)
    }

    fn endpoint(&self, opts: &SearchOptions) -> String {
        opts.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(self.config.endpoint.as_str())
            .to_string()
    }

    fn headers(&self, opts: &SearchOptions) -> BTreeMap<String, String> {
        let mut h = self.config.transport_headers.clone();
        h.extend(opts.transport_headers.clone());
        h
    }

    /// Run one search. A `&str`/`String` query gets default params.
    ///
    /// With `opts.timeout_ms` set, the caller is released with [`Error::SoftTimeout`] once the
    /// deadline passes; the remote call itself keeps running in the background.
    pub async fn search(
        &self,
        params: impl Into<SearchParams>,
        opts: SearchOptions,
    ) -> Result<SearchOutcome> {
        let t0 = Instant::now();
        let credential = self.credential(&opts)?;
        let params = params.into().normalized()?;
        let endpoint = self.endpoint(&opts);
        let tool = self.config.tool_name.clone();

        let acquired = self
            .pool
            .acquire(
                &endpoint,
                &credential,
                &self.headers(&opts),
                opts.reuse_connection,
            )
            .await?;

        if opts.validate_tool_availability {
            self.ensure_tool(&acquired.session).await?;
        }

        let reply = invoke_with_deadline(
            Arc::clone(&acquired.session),
            &tool,
            &params,
            opts.timeout(),
        )
        .await?;
        if reply.is_error {
            tracing::warn!(
                endpoint = %endpoint,
                tool = %tool,
                "remote reported an application error"
            );
            return Err(Error::RemoteApplicationError {
                raw: reply.to_json(),
            });
        }

        let records = extract_records(&reply.content);
        let items = normalize(&records);
        let meta = SearchMeta {
            endpoint,
            tool,
            elapsed_ms: t0.elapsed().as_millis(),
            requested_count: params.count,
            returned_count: items.len(),
            reused_connection: opts.reuse_connection,
            cache_hit: acquired.cache_hit,
        };
        tracing::info!(
            endpoint = %meta.endpoint,
            tool = %meta.tool,
            requested = meta.requested_count,
            records = records.len(),
            returned = meta.returned_count,
            elapsed_ms = meta.elapsed_ms as u64,
            "search complete"
        );
        Ok(SearchOutcome {
            items,
            raw_blocks: reply.content,
            meta,
        })
    }

    /// Remote tool names, over the same pooled session a search would use.
    pub async fn list_tools(&self, opts: &SearchOptions) -> Result<Vec<String>> {
        let credential = self.credential(opts)?;
        let endpoint = self.endpoint(opts);
        let acquired = self
            .pool
            .acquire(
                &endpoint,
                &credential,
                &self.headers(opts),
                opts.reuse_connection,
            )
            .await?;
        acquired.session.list_tools().await
    }

    async fn ensure_tool(&self, session: &SessionHandle) -> Result<()> {
        let tool = &self.config.tool_name;
        let names = session
            .list_tools()
            .await
            .map_err(|e| Error::ToolNotAvailable {
                tool: tool.clone(),
                reason: ToolUnavailableReason::ListingFailed(e.to_string()),
            })?;
        if names.iter().any(|n| n == tool) {
            Ok(())
        } else {
            Err(Error::ToolNotAvailable {
                tool: tool.clone(),
                reason: ToolUnavailableReason::Missing,
            })
        }
    }
}

async fn invoke_with_deadline(
    session: SessionHandle,
    tool: &str,
    params: &SearchParams,
    deadline: Option<Duration>,
) -> Result<ToolReply> {
    let name = tool.to_string();
    let args = params.to_arguments();
    // Detached task: dropping the handle on timeout does not cancel the call.
    let call = tokio::spawn(async move { session.call_tool(&name, args).await });
    let joined = match deadline {
        Some(d) => match tokio::time::timeout(d, call).await {
            Ok(joined) => joined,
            Err(_) => {
                let timeout_ms = d.as_millis() as u64;
                tracing::warn!(tool, timeout_ms, "soft timeout; remote call left running");
                return Err(Error::SoftTimeout { timeout_ms });
            }
        },
        None => call.await,
    };
    joined.map_err(|e| Error::RemoteInvocationFailed(format!("remote call task: {e}")))?
}
