//! Current authentication session.
//!
//! [`Session`] is the single place that knows who is signed in. The auth
//! client writes to it; the record store reads the bearer token from it;
//! the cart subscribes to it and follows sign-in and sign-out.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::watch;

use lumiere_core::UserId;

use crate::models::AuthSession;

/// Change notifications carry the whole session (or `None` when signed out).
pub type SessionReceiver = watch::Receiver<Option<Arc<AuthSession>>>;

/// Shared holder of the current session.
///
/// Cheaply cloneable; all clones observe the same state.
#[derive(Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Option<Arc<AuthSession>>>>,
}

impl Session {
    /// Create an anonymous (signed-out) session.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The current session, if signed in.
    #[must_use]
    pub fn current(&self) -> Option<Arc<AuthSession>> {
        self.tx.borrow().clone()
    }

    /// ID of the signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.tx.borrow().as_ref().map(|session| session.user.id)
    }

    /// Bearer token of the signed-in user, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.tx
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    /// Publish a new session (sign-in or token refresh).
    pub fn set(&self, session: AuthSession) {
        tracing::debug!(user_id = %session.user.id, "Session established");
        self.tx.send_replace(Some(Arc::new(session)));
    }

    /// Transition to anonymous. Subscribers are only notified if a user was
    /// signed in.
    pub fn clear(&self) {
        self.tx.send_if_modified(|current| {
            let was_signed_in = current.is_some();
            *current = None;
            was_signed_in
        });
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> SessionReceiver {
        self.tx.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.current_user())
            .finish()
    }
}
