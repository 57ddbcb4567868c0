use async_trait::async_trait;

use super::{AuthMode, SessionError};
use crate::identity::Identity;

/// Source of signing identities for [`Session::connect`](super::Session::connect)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn mode(&self) -> AuthMode;

    /// Obtain a new identity, possibly after user interaction
    async fn authenticate(&self) -> Result<Identity, SessionError>;
}

/// Local development: a fresh keypair, no external authentication
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralProvider;

#[async_trait]
impl IdentityProvider for EphemeralProvider {
    fn mode(&self) -> AuthMode {
        AuthMode::Ephemeral
    }

    async fn authenticate(&self) -> Result<Identity, SessionError> {
        Ok(Identity::generate())
    }
}
