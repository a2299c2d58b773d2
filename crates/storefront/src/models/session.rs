//! Session-related types.
//!
//! An [`AuthSession`] is what the auth provider hands back on sign-in: the
//! user's identity plus the bearer tokens that row-level security checks.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use lumiere_core::{Email, UserId};

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Auth provider user ID (also the `user_id` of every owned row).
    pub id: UserId,
    /// Email address, when the provider reports one.
    pub email: Option<Email>,
}

/// An authenticated session.
///
/// `Debug` output never contains the tokens (`SecretString` redacts itself).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    /// Bearer token for row-level requests.
    pub access_token: SecretString,
    /// Token used to obtain a fresh access token.
    pub refresh_token: SecretString,
    /// When `access_token` stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}
