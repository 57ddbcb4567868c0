//! Signing identities
//!
//! An [`Identity`] wraps an ed25519 key that signs outgoing requests. A
//! delegated identity signs with a short-lived session key that an external
//! identity provider has authorised to act for the user's principal until the
//! delegation expires.
//!
//! Security: the secret key is held in an `ed25519_dalek::SigningKey`, which
//! zeroizes itself on drop. Secret bytes handed out for persistence are wrapped
//! in `Zeroizing`.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::principal::Principal;

/// DER prefix of an ed25519 SubjectPublicKeyInfo
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Domain separator for delegation signatures
const DELEGATION_DOMAIN: &[u8] = b"\x1Aic-request-auth-delegation";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("public key is not a DER-encoded ed25519 key")]
    UnsupportedKey,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("signature does not verify")]
    BadSignature,
    #[error("delegation expired at {0}")]
    DelegationExpired(u64),
    #[error("delegation is for a different session key")]
    DelegationKeyMismatch,
}

/// DER-encode an ed25519 public key
pub fn ed25519_der(public_key: &[u8; 32]) -> Vec<u8> {
    let mut der = Vec::with_capacity(ED25519_DER_PREFIX.len() + 32);
    der.extend_from_slice(&ED25519_DER_PREFIX);
    der.extend_from_slice(public_key);
    der
}

/// Verify an ed25519 signature against a DER-encoded public key
pub fn verify_der_signature(
    public_key_der: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), IdentityError> {
    let raw = public_key_der
        .strip_prefix(&ED25519_DER_PREFIX[..])
        .ok_or(IdentityError::UnsupportedKey)?;
    let raw: [u8; 32] = raw.try_into().map_err(|_| IdentityError::UnsupportedKey)?;
    let key = VerifyingKey::from_bytes(&raw).map_err(|_| IdentityError::InvalidPublicKey)?;
    let signature: [u8; 64] = signature
        .try_into()
        .map_err(|_| IdentityError::BadSignature)?;
    key.verify(message, &Signature::from_bytes(&signature))
        .map_err(|_| IdentityError::BadSignature)
}

/// Authorisation of a session key by a user key, valid until `expiration`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// DER-encoded session public key being authorised
    #[serde(with = "hex")]
    pub pubkey: Vec<u8>,
    /// Expiry in nanoseconds since the Unix epoch
    pub expiration: u64,
    /// DER-encoded public key of the delegating user
    #[serde(with = "hex")]
    pub user_key: Vec<u8>,
    /// Signature by the user key over [`Delegation::signing_message`]
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
}

impl Delegation {
    /// The bytes a user key signs to authorise `session_pubkey`
    pub fn signing_message(session_pubkey: &[u8], expiration: u64) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(session_pubkey);
        hasher.update(expiration.to_be_bytes());
        let mut message = DELEGATION_DOMAIN.to_vec();
        message.extend_from_slice(&hasher.finalize());
        message
    }

    /// Principal the delegation acts for
    pub fn principal(&self) -> Principal {
        Principal::self_authenticating(&self.user_key)
    }

    pub fn is_expired(&self, now_nanos: u64) -> bool {
        now_nanos >= self.expiration
    }

    /// Check expiry and, for ed25519 user keys, the user's signature.
    ///
    /// Keys of other algorithms are accepted unverified; the remote side
    /// validates them.
    pub fn verify(&self, now_nanos: u64) -> Result<(), IdentityError> {
        if self.is_expired(now_nanos) {
            return Err(IdentityError::DelegationExpired(self.expiration));
        }
        let message = Self::signing_message(&self.pubkey, self.expiration);
        match verify_der_signature(&self.user_key, &message, &self.signature) {
            Err(IdentityError::UnsupportedKey) => Ok(()),
            other => other,
        }
    }
}

/// A credential able to sign requests
pub struct Identity {
    signing_key: SigningKey,
    delegation: Option<Delegation>,
    principal: Principal,
}

impl Identity {
    /// Generate a fresh throwaway identity
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Restore an identity from its 32-byte secret
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let der = ed25519_der(&signing_key.verifying_key().to_bytes());
        Self {
            principal: Principal::self_authenticating(&der),
            signing_key,
            delegation: None,
        }
    }

    /// Build an identity that signs with `session_secret` on behalf of the
    /// delegation's user.
    pub fn delegated(
        session_secret: &[u8; 32],
        delegation: Delegation,
    ) -> Result<Self, IdentityError> {
        let signing_key = SigningKey::from_bytes(session_secret);
        let session_der = ed25519_der(&signing_key.verifying_key().to_bytes());
        if session_der != delegation.pubkey {
            return Err(IdentityError::DelegationKeyMismatch);
        }
        Ok(Self {
            principal: delegation.principal(),
            signing_key,
            delegation: Some(delegation),
        })
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    /// DER-encoded public key of the signing key
    pub fn public_key_der(&self) -> Vec<u8> {
        ed25519_der(&self.signing_key.verifying_key().to_bytes())
    }

    pub fn delegation(&self) -> Option<&Delegation> {
        self.delegation.as_ref()
    }

    /// True when the identity carries a delegation that has run out
    pub fn is_expired(&self, now_nanos: u64) -> bool {
        self.delegation
            .as_ref()
            .map_or(false, |d| d.is_expired(now_nanos))
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Secret key bytes, for the session store only
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("principal", &self.principal)
            .field("delegated", &self.delegation.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegate(user: &SigningKey, session: &Identity, expiration: u64) -> Delegation {
        let pubkey = session.public_key_der();
        let message = Delegation::signing_message(&pubkey, expiration);
        Delegation {
            pubkey,
            expiration,
            user_key: ed25519_der(&user.verifying_key().to_bytes()),
            signature: user.sign(&message).to_bytes().to_vec(),
        }
    }

    #[test]
    fn test_generated_identities_differ() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert_ne!(a.principal(), b.principal());
        assert!(a.principal().is_self_authenticating());
    }

    #[test]
    fn test_secret_roundtrip() {
        let identity = Identity::generate();
        let restored = Identity::from_secret_bytes(&identity.secret_bytes());
        assert_eq!(identity.principal(), restored.principal());
        assert_eq!(identity.public_key_der(), restored.public_key_der());
    }

    #[test]
    fn test_sign_and_verify() {
        let identity = Identity::generate();
        let signature = identity.sign(b"payload");
        assert!(verify_der_signature(&identity.public_key_der(), b"payload", &signature).is_ok());
        assert_eq!(
            verify_der_signature(&identity.public_key_der(), b"tampered", &signature),
            Err(IdentityError::BadSignature)
        );
    }

    #[test]
    fn test_delegated_identity() {
        let user = SigningKey::generate(&mut OsRng);
        let session = Identity::generate();
        let delegation = delegate(&user, &session, 1_000);

        let identity = Identity::delegated(&session.secret_bytes(), delegation.clone()).unwrap();
        let user_principal =
            Principal::self_authenticating(&ed25519_der(&user.verifying_key().to_bytes()));
        assert_eq!(identity.principal(), user_principal);
        assert_ne!(identity.principal(), session.principal());
        assert!(delegation.verify(999).is_ok());
        assert_eq!(
            delegation.verify(1_000),
            Err(IdentityError::DelegationExpired(1_000))
        );
        assert!(identity.is_expired(1_000));
    }

    #[test]
    fn test_delegation_for_other_key_rejected() {
        let user = SigningKey::generate(&mut OsRng);
        let session = Identity::generate();
        let other = Identity::generate();
        let delegation = delegate(&user, &session, 1_000);
        assert_eq!(
            Identity::delegated(&other.secret_bytes(), delegation).unwrap_err(),
            IdentityError::DelegationKeyMismatch
        );
    }

    #[test]
    fn test_forged_delegation_rejected() {
        let user = SigningKey::generate(&mut OsRng);
        let session = Identity::generate();
        let mut delegation = delegate(&user, &session, 1_000);
        delegation.expiration = 2_000;
        assert_eq!(delegation.verify(0), Err(IdentityError::BadSignature));
    }

    #[test]
    fn test_debug_hides_secret() {
        let identity = Identity::generate();
        let debug = format!("{:?}", identity);
        assert!(debug.contains("principal"));
        assert!(!debug.contains(&hex::encode(*identity.secret_bytes())));
    }
}
