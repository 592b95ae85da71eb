//! [`Connector`] over the rmcp streamable-HTTP client.

use primesearch_core::{Connector, Error, Result, Session, SessionHandle, ToolReply};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::{
    model::CallToolRequestParam,
    service::{RoleClient, RunningService, ServiceExt},
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig,
        StreamableHttpClientTransport,
    },
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RmcpConnector {
    connect_timeout: Duration,
    user_agent: String,
}

impl Default for RmcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("primesearch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RmcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..Self::default()
        }
    }
}

pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut out = HeaderMap::new();
    for (k, v) in headers {
        let name = HeaderName::from_bytes(k.trim().as_bytes()).map_err(|e| {
            Error::RemoteInvocationFailed(format!("invalid header name {k:?}: {e}"))
        })?;
        // Header values may carry the credential; never echo them.
        let value = HeaderValue::from_str(v.trim()).map_err(|_| {
            Error::RemoteInvocationFailed(format!("invalid value for header {k:?}"))
        })?;
        out.insert(name, value);
    }
    Ok(out)
}

#[async_trait::async_trait]
impl Connector for RmcpConnector {
    async fn connect(
        &self,
        endpoint: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<SessionHandle> {
        let client = reqwest::Client::builder()
            .default_headers(header_map(headers)?)
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| Error::RemoteInvocationFailed(e.to_string()))?;
        let transport = StreamableHttpClientTransport::with_client(
            client,
            StreamableHttpClientTransportConfig::with_uri(endpoint.to_string()),
        );
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| Error::RemoteInvocationFailed(format!("connect {endpoint}: {e}")))?;
        tracing::debug!(endpoint, "mcp session established");
        Ok(Arc::new(RmcpSession { service }))
    }
}

pub struct RmcpSession {
    service: RunningService<RoleClient, ()>,
}

#[async_trait::async_trait]
impl Session for RmcpSession {
    async fn list_tools(&self) -> Result<Vec<String>> {
        // Follows `next_cursor` across every page.
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| Error::RemoteInvocationFailed(e.to_string()))?;
        Ok(tools
            .iter()
            .map(|t| t.name.clone().into_owned())
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolReply> {
        let r = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| Error::RemoteInvocationFailed(e.to_string()))?;
        let content = r
            .content
            .iter()
            .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
            .collect();
        Ok(ToolReply {
            content,
            is_error: r.is_error.unwrap_or(false),
        })
    }
}
