//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] lumiere_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The auth provider rejected the request.
    #[error("auth API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider message.
        message: String,
    },

    /// Rate limited by the auth provider.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),
}
