//! JSON-RPC 2.0 over HTTP
//!
//! Envelopes are posted to the replica host as `canister_query` or
//! `canister_update` requests. There is no retry or failover; a failed call
//! is reported to the caller as-is.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use super::{CallKind, Envelope, ReplicaStatus, Transport, TransportError};

/// Default timeout for RPC requests
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response. A `null` result is a valid answer (an absent
/// campaign, for one), so it is kept as a raw value.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

/// Transport that posts to a single replica endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unreachable {
                endpoint: base_url.to_string(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, TransportError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        debug!(
            "{} #{} answered in {}ms",
            method,
            id,
            start.elapsed().as_millis()
        );

        if !response.status().is_success() {
            return Err(TransportError::Http(response.status().as_u16()));
        }

        let json_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        if let Some(error) = json_response.error {
            warn!("{} #{} rejected: {} {}", method, id, error.code, error.message);
            return Err(TransportError::Rejected {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(json_response.result)
            .map_err(|e| TransportError::Malformed(format!("unexpected result: {}", e)))
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Unreachable {
                endpoint: self.base_url.clone(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, envelope: &Envelope) -> Result<Value, TransportError> {
        let method = match envelope.content.kind {
            CallKind::Query => "canister_query",
            CallKind::Update => "canister_update",
        };
        let params =
            serde_json::to_value(envelope).map_err(|e| TransportError::Envelope(e.to_string()))?;
        self.call(method, params).await
    }

    async fn status(&self) -> Result<ReplicaStatus, TransportError> {
        self.call("replica_status", json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let transport = HttpTransport::new("http://127.0.0.1:4943/", DEFAULT_RPC_TIMEOUT).unwrap();
        assert_eq!(transport.base_url(), "http://127.0.0.1:4943");
    }

    #[tokio::test]
    async fn test_unreachable_replica() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = HttpTransport::new(
            &format!("http://127.0.0.1:{}", port),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = transport.status().await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }
}
