use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientResult, ShapeError, TransportError};
use crate::transport::{HttpRequest, HttpTransport, RawResponse};

/// Reply fields accepted from the orchestrator, highest priority first.
pub const REPLY_FIELDS: [&str; 3] = ["reply", "result", "message"];

#[derive(Serialize)]
struct QueryRequest<'a> {
    text: &'a str,
}

/// Client for `POST {base}/query` on the remote orchestrator.
#[derive(Debug, Clone)]
pub struct RemoteQueryClient {
    transport: Arc<dyn HttpTransport>,
}

impl RemoteQueryClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Issue the query and hand back whatever came back, any status.
    pub async fn send(&self, base_url: &str, text: &str) -> Result<RawResponse, TransportError> {
        let url = format!("{}/query", base_url);
        let body = serde_json::to_value(QueryRequest { text })
            .map_err(|e| TransportError::Request(e.to_string()))?;

        self.transport.send(HttpRequest::post(url).json(body)).await
    }

    /// Send and normalize to reply text.
    pub async fn query(&self, base_url: &str, text: &str) -> ClientResult<String> {
        let response = self.send(base_url, text).await?;
        Ok(normalize_reply(&response)?)
    }
}

/// Turn a raw orchestrator response into reply text.
///
/// Non-success statuses and undecodable bodies are shape errors.
pub fn normalize_reply(response: &RawResponse) -> Result<String, ShapeError> {
    if !response.is_success() {
        return Err(ShapeError::Status(response.status));
    }

    let payload: Value = response.json()?;
    Ok(extract_reply(&payload))
}

/// First non-null field of [`REPLY_FIELDS`]; otherwise the whole payload as JSON text.
pub fn extract_reply(payload: &Value) -> String {
    REPLY_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field))
        .find(|value| !value.is_null())
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| payload.to_string())
}
