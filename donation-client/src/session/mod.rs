//! Wallet session
//!
//! A [`Session`] owns the connect/disconnect lifecycle. Its state is published
//! on a watch channel; service clients hold a [`SessionHandle`] and take one
//! snapshot of the identity per request, so a connect or disconnect never
//! changes the signer of a call already being built.

mod callback;
mod provider;
mod store;

pub use callback::{parse_callback, CallbackParams, DelegatedProvider, Presenter};
pub use provider::{EphemeralProvider, IdentityProvider};
pub use store::{SessionStore, StoreError, StoredSummary};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::identity::{Identity, IdentityError};
use crate::principal::Principal;
use crate::rpc::envelope::now_nanos;

/// How the current identity was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Throwaway keypair generated locally
    Ephemeral,
    /// Session key delegated by the identity provider
    Delegated,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity provider failed: {0}")]
    ProviderFailed(String),
    #[error("login was not completed within {0:?}")]
    LoginTimedOut(Duration),
    #[error("invalid login callback: {0}")]
    CallbackInvalid(String),
    #[error("delegation rejected: {0}")]
    Delegation(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected {
        identity: Arc<Identity>,
        mode: AuthMode,
    },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Arc<Identity>> {
        match self {
            SessionState::Connected { identity, .. } => Some(identity),
            SessionState::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }
}

/// Read side of the session, cheap to clone
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// A handle that is never connected, for anonymous-only clients
    pub fn disconnected() -> Self {
        let (_tx, state) = watch::channel(SessionState::Disconnected);
        Self { state }
    }

    /// Snapshot of the current signer
    pub fn current_identity(&self) -> Option<Arc<Identity>> {
        self.state.borrow().identity().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state.borrow().identity().map(|i| i.principal())
    }

    /// Wait for the next connect or disconnect
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}

pub struct Session {
    provider: Box<dyn IdentityProvider>,
    store: Option<SessionStore>,
    state: watch::Sender<SessionState>,
    /// Held for the whole of a connect so concurrent callers authenticate once
    connecting: Mutex<()>,
}

impl Session {
    pub fn new(provider: Box<dyn IdentityProvider>, store: Option<SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            provider,
            store,
            state,
            connecting: Mutex::new(()),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: self.state.subscribe(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.provider.mode()
    }

    pub fn store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state.borrow().identity().map(|i| i.principal())
    }

    /// Startup probe: resume a persisted session if one is still valid.
    ///
    /// Returns whether the session is now connected. An expired delegation
    /// removes the stored session.
    pub fn restore(&self) -> Result<bool, SessionError> {
        let Some(store) = &self.store else {
            return Ok(self.is_connected());
        };
        let Some((identity, mode)) = store.load()? else {
            return Ok(self.is_connected());
        };

        if identity.is_expired(now_nanos()) {
            info!("Stored session for {} has expired", identity.principal());
            store.clear()?;
            return Ok(self.is_connected());
        }

        info!("Restored session for {}", identity.principal());
        self.state.send_replace(SessionState::Connected {
            identity: Arc::new(identity),
            mode,
        });
        Ok(true)
    }

    /// Acquire an identity and mark the session connected.
    ///
    /// Connecting an already-connected session returns the current principal,
    /// including when another connect finished while this one waited.
    /// On failure the session is left as it was.
    pub async fn connect(&self) -> Result<Principal, SessionError> {
        let _connecting = self.connecting.lock().await;
        if let Some(principal) = self.principal() {
            return Ok(principal);
        }

        let identity = self.provider.authenticate().await?;
        let mode = self.provider.mode();
        if let Some(store) = &self.store {
            store.save(&identity, mode)?;
        }

        let principal = identity.principal();
        info!("Connected as {} ({:?})", principal, mode);
        self.state.send_replace(SessionState::Connected {
            identity: Arc::new(identity),
            mode,
        });
        Ok(principal)
    }

    /// Drop the identity and remove any persisted session.
    ///
    /// The in-memory session is cleared even if the file cannot be removed.
    pub fn disconnect(&self) -> Result<(), SessionError> {
        let previous = self.state.send_replace(SessionState::Disconnected);
        if let Some(identity) = previous.identity() {
            info!("Disconnected {}", identity.principal());
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!("Failed to remove session file: {}", e);
                return Err(e.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FailingProvider;

    #[async_trait]
    impl IdentityProvider for FailingProvider {
        fn mode(&self) -> AuthMode {
            AuthMode::Delegated
        }

        async fn authenticate(&self) -> Result<Identity, SessionError> {
            Err(SessionError::ProviderFailed("user closed the window".into()))
        }
    }

    #[tokio::test]
    async fn test_connect_disconnect() {
        let session = Session::new(Box::new(EphemeralProvider), None);
        let handle = session.handle();
        assert!(!handle.is_connected());

        let principal = session.connect().await.unwrap();
        assert_eq!(handle.principal(), Some(principal));
        assert!(!principal.is_anonymous());

        session.disconnect().unwrap();
        assert!(handle.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let session = Session::new(Box::new(EphemeralProvider), None);
        let first = session.connect().await.unwrap();
        let second = session.connect().await.unwrap();
        assert_eq!(first, second);
    }

    struct CountingProvider {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        fn mode(&self) -> AuthMode {
            AuthMode::Ephemeral
        }

        async fn authenticate(&self) -> Result<Identity, SessionError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            // Let a concurrent connect run while this one is mid-login.
            tokio::task::yield_now().await;
            Ok(Identity::generate())
        }
    }

    #[tokio::test]
    async fn test_concurrent_connects_authenticate_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        let provider = Arc::new(CountingProvider {
            calls: Default::default(),
        });
        let session = Session::new(
            Box::new(SharedProvider(Arc::clone(&provider))),
            Some(SessionStore::new(&path, "passphrase")),
        );

        let (first, second) = tokio::join!(session.connect(), session.connect());
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let (stored, _) = SessionStore::new(&path, "passphrase")
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(Some(stored.principal()), session.principal());
    }

    struct SharedProvider(Arc<CountingProvider>);

    #[async_trait]
    impl IdentityProvider for SharedProvider {
        fn mode(&self) -> AuthMode {
            self.0.mode()
        }

        async fn authenticate(&self) -> Result<Identity, SessionError> {
            self.0.authenticate().await
        }
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_session_unchanged() {
        let session = Session::new(Box::new(FailingProvider), None);
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ProviderFailed(_)));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_snapshot_survives_disconnect() {
        let session = Session::new(Box::new(EphemeralProvider), None);
        let principal = session.connect().await.unwrap();
        let snapshot = session.handle().current_identity().unwrap();
        session.disconnect().unwrap();
        assert_eq!(snapshot.principal(), principal);
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");

        let first = Session::new(
            Box::new(EphemeralProvider),
            Some(SessionStore::new(&path, "passphrase")),
        );
        let principal = first.connect().await.unwrap();

        let second = Session::new(
            Box::new(EphemeralProvider),
            Some(SessionStore::new(&path, "passphrase")),
        );
        assert!(second.restore().unwrap());
        assert_eq!(second.principal(), Some(principal));

        second.disconnect().unwrap();
        assert!(!path.exists());
        // Each session keeps its own in-memory state.
        assert!(first.handle().current_identity().is_some());
    }

    #[tokio::test]
    async fn test_handle_observes_changes() {
        let session = Session::new(Box::new(EphemeralProvider), None);
        let mut handle = session.handle();
        session.connect().await.unwrap();
        assert!(handle.changed().await);
        assert!(handle.is_connected());
    }
}
