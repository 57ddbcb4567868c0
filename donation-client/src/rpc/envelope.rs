//! Signed request envelopes
//!
//! Every remote call is wrapped in an [`Envelope`]. The request id is the
//! SHA-256 of the JSON-serialised [`CallContent`]; signed envelopes carry an
//! ed25519 signature over `"\x0Aic-request" || request_id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::identity::{verify_der_signature, Delegation, Identity, IdentityError};
use crate::principal::Principal;

/// Domain separator for request signatures
const REQUEST_DOMAIN: &[u8] = b"\x0Aic-request";

/// How long a request stays valid after it is built
pub const INGRESS_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Whether a call reads or mutates remote state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Query,
    Update,
}

/// The signed portion of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallContent {
    pub kind: CallKind,
    pub canister_id: Principal,
    pub method: String,
    /// Positional arguments as a JSON array
    pub arg: Value,
    pub sender: Principal,
    #[serde(with = "hex")]
    pub nonce: Vec<u8>,
    /// Nanoseconds since the Unix epoch
    pub ingress_expiry: u64,
}

impl CallContent {
    pub fn request_id(&self) -> Result<[u8; 32], serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Sha256::digest(bytes).into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("content could not be serialised: {0}")]
    Serialization(String),
    #[error("request expired")]
    Expired,
    #[error("non-anonymous sender {0} did not sign the request")]
    MissingSignature(Principal),
    #[error("anonymous requests must not be signed")]
    UnexpectedSignature,
    #[error("sender {sender} does not own the signing key")]
    SenderMismatch { sender: Principal },
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// A request ready for the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub content: CallContent,
    #[serde(default, with = "opt_hex", skip_serializing_if = "Option::is_none")]
    pub sender_pubkey: Option<Vec<u8>>,
    #[serde(default, with = "opt_hex", skip_serializing_if = "Option::is_none")]
    pub sender_sig: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_delegation: Option<Delegation>,
}

impl Envelope {
    /// Wrap content for an anonymous call
    pub fn anonymous(mut content: CallContent) -> Self {
        content.sender = Principal::anonymous();
        Self {
            content,
            sender_pubkey: None,
            sender_sig: None,
            sender_delegation: None,
        }
    }

    /// Sign content with `identity`, which becomes the sender
    pub fn signed(mut content: CallContent, identity: &Identity) -> Result<Self, EnvelopeError> {
        content.sender = identity.principal();
        let request_id = content
            .request_id()
            .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        let signature = identity.sign(&signing_message(&request_id));
        Ok(Self {
            content,
            sender_pubkey: Some(identity.public_key_der()),
            sender_sig: Some(signature.to_vec()),
            sender_delegation: identity.delegation().cloned(),
        })
    }

    /// Check the envelope as a replica would: expiry, signature, and that the
    /// sender principal belongs to the signing key or its delegation.
    pub fn verify(&self, now_nanos: u64) -> Result<(), EnvelopeError> {
        if now_nanos > self.content.ingress_expiry {
            return Err(EnvelopeError::Expired);
        }

        let sender = self.content.sender;
        let (pubkey, sig) = match (&self.sender_pubkey, &self.sender_sig) {
            (Some(pubkey), Some(sig)) => (pubkey, sig),
            _ if sender.is_anonymous() => return Ok(()),
            _ => return Err(EnvelopeError::MissingSignature(sender)),
        };
        if sender.is_anonymous() {
            return Err(EnvelopeError::UnexpectedSignature);
        }

        let request_id = self
            .content
            .request_id()
            .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        verify_der_signature(pubkey, &signing_message(&request_id), sig)?;

        let owner = match &self.sender_delegation {
            Some(delegation) => {
                if &delegation.pubkey != pubkey {
                    return Err(IdentityError::DelegationKeyMismatch.into());
                }
                delegation.verify(now_nanos)?;
                delegation.principal()
            }
            None => Principal::self_authenticating(pubkey),
        };
        if owner != sender {
            return Err(EnvelopeError::SenderMismatch { sender });
        }
        Ok(())
    }
}

fn signing_message(request_id: &[u8; 32]) -> Vec<u8> {
    let mut message = REQUEST_DOMAIN.to_vec();
    message.extend_from_slice(request_id);
    message
}

/// Current time in nanoseconds since the Unix epoch
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(d)?;
        text.map(|t| hex::decode(t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
