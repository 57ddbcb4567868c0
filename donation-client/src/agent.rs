//! Signs and submits calls on behalf of the current session

use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::ClientError;
use crate::principal::Principal;
use crate::rpc::envelope::{now_nanos, INGRESS_EXPIRY};
use crate::rpc::{CallContent, CallKind, Envelope, ReplicaStatus, Transport, TransportError};
use crate::session::SessionHandle;

/// Shared by all service clients; cheap to clone
#[derive(Clone)]
pub struct Agent {
    transport: Arc<dyn Transport>,
    session: SessionHandle,
}

impl Agent {
    pub fn new(transport: Arc<dyn Transport>, session: SessionHandle) -> Self {
        Self { transport, session }
    }

    /// Principal requests are currently signed as, `None` when anonymous
    pub fn caller(&self) -> Option<Principal> {
        self.session.principal()
    }

    /// The caller's principal, or `NotConnected` naming the operation
    pub fn require_caller(&self, operation: &'static str) -> Result<Principal, ClientError> {
        self.caller().ok_or(ClientError::NotConnected(operation))
    }

    pub async fn status(&self) -> Result<ReplicaStatus, ClientError> {
        Ok(self.transport.status().await?)
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        canister: Principal,
        method: &str,
        arg: Value,
    ) -> Result<T, ClientError> {
        self.call(CallKind::Query, canister, method, arg).await
    }

    pub async fn update<T: DeserializeOwned>(
        &self,
        canister: Principal,
        method: &str,
        arg: Value,
    ) -> Result<T, ClientError> {
        self.call(CallKind::Update, canister, method, arg).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        kind: CallKind,
        canister: Principal,
        method: &str,
        arg: Value,
    ) -> Result<T, ClientError> {
        // One snapshot per call: a concurrent connect or disconnect does not
        // change who signs this request.
        let identity = self.session.current_identity();

        let mut nonce = vec![0u8; 16];
        rand::thread_rng().fill(&mut nonce[..]);
        let content = CallContent {
            kind,
            canister_id: canister,
            method: method.to_string(),
            arg,
            sender: Principal::anonymous(),
            nonce,
            ingress_expiry: now_nanos().saturating_add(INGRESS_EXPIRY.as_nanos() as u64),
        };

        let envelope = match &identity {
            Some(identity) => Envelope::signed(content, identity).map_err(TransportError::from)?,
            None => Envelope::anonymous(content),
        };
        debug!(
            "{:?} {}.{} as {}",
            kind, canister, method, envelope.content.sender
        );

        let reply = self.transport.submit(&envelope).await?;
        serde_json::from_value(reply).map_err(|source| ClientError::Decode {
            method: method.to_string(),
            source,
        })
    }
}
