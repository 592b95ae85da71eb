use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Remote procedure exposed by the search service.
pub const DEFAULT_TOOL_NAME: &str = "webSearchPrime";

/// Well-known streamable-HTTP MCP endpoint for the search procedure.
pub const DEFAULT_ENDPOINT: &str = "https://open.bigmodel.cn/api/mcp/web_search_prime/mcp";

pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 50;
pub const DEFAULT_COUNT: u32 = 10;

/// Why the optional tool-availability check failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolUnavailableReason {
    #[error("not present in the remote tool listing")]
    Missing,
    #[error("tool listing failed: {0}")]
    ListingFailed(String),
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("missing credential: pass an api key or set BIGMODEL_API_KEY")]
    MissingCredential,
    #[error("invalid search params: {0}")]
    InvalidParams(String),
    #[error("tool {tool} not available: {reason}")]
    ToolNotAvailable {
        tool: String,
        reason: ToolUnavailableReason,
    },
    #[error("remote invocation failed: {0}")]
    RemoteInvocationFailed(String),
    #[error("remote application error")]
    RemoteApplicationError { raw: Value },
    #[error("soft timeout after {timeout_ms}ms (remote call may still be running)")]
    SoftTimeout { timeout_ms: u64 },
}

impl Error {
    /// Stable machine-readable code for envelopes and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingCredential => "missing_credential",
            Error::InvalidParams(_) => "invalid_params",
            Error::ToolNotAvailable {
                reason: ToolUnavailableReason::Missing,
                ..
            } => "tool_not_available",
            Error::ToolNotAvailable {
                reason: ToolUnavailableReason::ListingFailed(_),
                ..
            } => "tool_listing_failed",
            Error::RemoteInvocationFailed(_) => "remote_invocation_failed",
            Error::RemoteApplicationError { .. } => "remote_application_error",
            Error::SoftTimeout { .. } => "soft_timeout",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentSize {
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    #[default]
    Cn,
    Us,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecencyFilter {
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
    #[default]
    NoLimit,
}

/// Arguments of the remote search procedure, serialised with the remote field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchParams {
    pub search_query: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub content_size: ContentSize,
    #[serde(default)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_domain_filter: Option<String>,
    #[serde(default)]
    pub search_recency_filter: RecencyFilter,
}

fn default_count() -> u32 {
    DEFAULT_COUNT
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            search_query: query.into(),
            count: DEFAULT_COUNT,
            content_size: ContentSize::default(),
            location: Location::default(),
            search_domain_filter: None,
            search_recency_filter: RecencyFilter::default(),
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_content_size(mut self, size: ContentSize) -> Self {
        self.content_size = size;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_domain_filter(mut self, domain: impl Into<String>) -> Self {
        self.search_domain_filter = Some(domain.into());
        self
    }

    pub fn with_recency(mut self, recency: RecencyFilter) -> Self {
        self.search_recency_filter = recency;
        self
    }

    /// Boundary check: rejects a blank query and clamps `count` into the accepted range.
    pub fn normalized(mut self) -> Result<Self> {
        if self.search_query.trim().is_empty() {
            return Err(Error::InvalidParams(
                "search_query must not be blank".to_string(),
            ));
        }
        self.count = self.count.clamp(MIN_COUNT, MAX_COUNT);
        if let Some(d) = self.search_domain_filter.as_deref() {
            if d.trim().is_empty() {
                self.search_domain_filter = None;
            }
        }
        Ok(self)
    }

    /// Argument object for the remote call.
    pub fn to_arguments(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        }
    }
}

impl From<&str> for SearchParams {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for SearchParams {
    fn from(query: String) -> Self {
        Self::new(query)
    }
}

/// Per-call knobs for [`SearchParams`] dispatch.
///
/// The credential is accepted on input but never written out, and `Debug` redacts it.
#[derive(Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Overrides the client's configured credential.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Overrides the client's configured endpoint.
    pub endpoint: Option<String>,
    /// Extra transport headers. `Authorization` is always set from the credential.
    pub transport_headers: BTreeMap<String, String>,
    pub reuse_connection: bool,
    pub validate_tool_availability: bool,
    /// Soft deadline for the remote call. Expiry releases the caller but does not
    /// cancel the in-flight request.
    pub timeout_ms: Option<u64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            transport_headers: BTreeMap::new(),
            reuse_connection: true,
            validate_tool_availability: false,
            timeout_ms: None,
        }
    }
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header values may hold secrets too; only names are shown.
        f.debug_struct("SearchOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field(
                "transport_headers",
                &self.transport_headers.keys().collect::<Vec<_>>(),
            )
            .field("reuse_connection", &self.reuse_connection)
            .field("validate_tool_availability", &self.validate_tool_availability)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl SearchOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// One search result before normalisation. Field names vary by provider.
pub type UntypedRecord = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refer: Option<Value>,
    pub raw: UntypedRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub endpoint: String,
    pub tool: String,
    pub elapsed_ms: u128,
    pub requested_count: u32,
    pub returned_count: usize,
    pub reused_connection: bool,
    /// True when a pooled session already existed for this endpoint/credential.
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub items: Vec<CanonicalItem>,
    pub raw_blocks: Vec<Value>,
    pub meta: SearchMeta,
}

/// Reply of a remote procedure call. `content` holds the raw protocol blocks
/// (`{"type":"text","text":...}` and friends) untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolReply {
    pub content: Vec<Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolReply {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// An established, reusable connection to the remote service.
#[async_trait::async_trait]
pub trait Session: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<String>>;
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolReply>;
}

pub type SessionHandle = Arc<dyn Session>;

/// Establishes sessions. Implementations own the wire protocol.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<SessionHandle>;
}
