//! Remote procedure transport
//!
//! The [`Transport`] trait is the seam between the typed service clients and
//! the wire. [`HttpTransport`] speaks JSON-RPC 2.0 over HTTP; tests substitute
//! an in-memory replica.

pub mod envelope;
pub mod http;

pub use envelope::{CallContent, CallKind, Envelope, EnvelopeError};
pub use http::HttpTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Failures below the service layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("replica at {endpoint} is unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("replica returned HTTP {0}")]
    Http(u16),
    #[error("replica rejected the call (code {code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("could not build request: {0}")]
    Envelope(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Failures worth a transient "try again" notification
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Unreachable { .. } | TransportError::Timeout(_) => true,
            TransportError::Http(status) => *status >= 500,
            _ => false,
        }
    }
}

impl From<EnvelopeError> for TransportError {
    fn from(src: EnvelopeError) -> Self {
        TransportError::Envelope(src.to_string())
    }
}

/// Replica health as reported by `replica_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaStatus {
    pub impl_version: String,
    /// Root key, only exposed by local development replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_key: Option<String>,
    pub healthy: bool,
}

/// Sends envelopes to a replica and returns the raw reply
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a query or update call
    async fn submit(&self, envelope: &Envelope) -> Result<Value, TransportError>;

    /// Probe replica health
    async fn status(&self) -> Result<ReplicaStatus, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn submit(&self, envelope: &Envelope) -> Result<Value, TransportError> {
        (**self).submit(envelope).await
    }

    async fn status(&self) -> Result<ReplicaStatus, TransportError> {
        (**self).status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(TransportError::Unreachable {
            endpoint: "http://127.0.0.1:4943".into(),
            reason: "connection refused".into()
        }
        .is_transient());
        assert!(TransportError::Http(503).is_transient());
        assert!(!TransportError::Http(404).is_transient());
        assert!(!TransportError::Rejected {
            code: 403,
            message: "bad signature".into()
        }
        .is_transient());
    }
}
