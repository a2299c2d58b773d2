//! Authentication service.
//!
//! Password sign-in against the hosted auth provider (`/auth/v1`). Every
//! successful sign-in or refresh is published to the shared [`Session`], which
//! is what the record store and the cart follow.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use lumiere_core::{Email, UserId};

use crate::config::StorefrontConfig;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{AuthSession, AuthUser};
use crate::services::session::Session;

/// Minimum password length accepted by the auth provider.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Result of a sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is active and the user is now signed in.
    SignedIn(AuthUser),
    /// The account exists but the email address must be confirmed first.
    ConfirmationRequired(AuthUser),
}

/// Authentication client.
///
/// Cheaply cloneable; clones share the HTTP client and the session.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

struct AuthClientInner {
    client: reqwest::Client,
    auth_url: Url,
    anon_key: SecretString,
    session: Session,
}

impl AuthClient {
    /// Create a new authentication client.
    #[must_use]
    pub fn new(config: &StorefrontConfig, client: reqwest::Client, session: Session) -> Self {
        Self {
            inner: Arc::new(AuthClientInner {
                client,
                auth_url: config.supabase.auth_url(),
                anon_key: config.supabase.anon_key.clone(),
                session,
            }),
        }
    }

    /// The session this client publishes to.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthUser, AuthError> {
        // Validate locally before any round trip
        let email = Email::parse(email)?;
        validate_password(password.expose_secret())?;

        let body = self
            .post(
                "token",
                Some(("grant_type", "password")),
                None,
                &Credentials {
                    email: email.as_str(),
                    password: password.expose_secret(),
                },
            )
            .await?;

        let token: TokenResponse = serde_json::from_str(&body)?;
        let session = token.into_session(Utc::now())?;
        let user = session.user.clone();
        self.inner.session.set(session);

        tracing::info!(user_id = %user.id, "Signed in");
        set_sentry_user(&user.id, user.email.as_ref().map(Email::as_str));
        add_breadcrumb("auth", "Signed in", None);
        Ok(user)
    }

    /// Register a new account.
    ///
    /// If the provider returns a session right away the user is signed in;
    /// otherwise they must confirm their email first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password.expose_secret())?;

        let body = self
            .post(
                "signup",
                None,
                None,
                &Credentials {
                    email: email.as_str(),
                    password: password.expose_secret(),
                },
            )
            .await?;

        match parse_sign_up(&body, Utc::now())? {
            SignUpResult::Session(session) => {
                let user = session.user.clone();
                self.inner.session.set(*session);
                tracing::info!(user_id = %user.id, "Signed up and signed in");
                set_sentry_user(&user.id, user.email.as_ref().map(Email::as_str));
                Ok(SignUpOutcome::SignedIn(user))
            }
            SignUpResult::Pending(user) => {
                tracing::info!(user_id = %user.id, "Signed up, email confirmation pending");
                Ok(SignUpOutcome::ConfirmationRequired(user))
            }
        }
    }

    /// Sign out, revoking this session's refresh token. Other sessions of
    /// the same user stay signed in.
    ///
    /// The local session is cleared even if revoking the token remotely
    /// fails; the remote error is still returned.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` if nobody is signed in.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.inner.session.access_token().ok_or(AuthError::NotSignedIn)?;

        let result = self
            .post("logout", Some(("scope", "local")), Some(&token), &serde_json::json!({}))
            .await;
        self.inner.session.clear();
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);

        match result {
            Ok(_) => {
                tracing::info!("Signed out");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote sign-out failed; local session cleared");
                Err(e)
            }
        }
    }

    /// Exchange the refresh token for a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` if nobody is signed in.
    /// Returns `AuthError::InvalidCredentials` if the refresh token was revoked.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<AuthUser, AuthError> {
        let current = self.inner.session.current().ok_or(AuthError::NotSignedIn)?;

        let body = self
            .post(
                "token",
                Some(("grant_type", "refresh_token")),
                None,
                &RefreshRequest {
                    refresh_token: current.refresh_token.expose_secret(),
                },
            )
            .await?;

        let token: TokenResponse = serde_json::from_str(&body)?;
        let session = token.into_session(Utc::now())?;
        let user = session.user.clone();
        self.inner.session.set(session);

        tracing::debug!(user_id = %user.id, "Session refreshed");
        Ok(user)
    }

    // =========================================================================
    // HTTP
    // =========================================================================

    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        query: Option<(&str, &str)>,
        bearer: Option<&SecretString>,
        body: &B,
    ) -> Result<String, AuthError> {
        let url = endpoint_url(&self.inner.auth_url, endpoint, query);
        let bearer = bearer.unwrap_or(&self.inner.anon_key);

        let response = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(AuthError::RateLimited(retry_after));
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(error_from_response(status, &text));
        }
        Ok(text)
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("auth_url", &self.inner.auth_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl UserResponse {
    fn into_user(self) -> AuthUser {
        AuthUser {
            id: self.id,
            // Provider-side addresses are already validated; drop anything odd
            email: self.email.and_then(|e| Email::parse(&e).ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Result<AuthSession, AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::Api {
                status: 200,
                message: "token response without access token".to_string(),
            });
        }

        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));

        Ok(AuthSession {
            user: self.user.into_user(),
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
        })
    }
}

/// Error body of the auth API. Older deployments use
/// `error`/`error_description`, newer ones `error_code`/`msg`.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

enum SignUpResult {
    Session(Box<AuthSession>),
    Pending(AuthUser),
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// `<auth_url>/<endpoint>[?key=value]`.
fn endpoint_url(auth_url: &Url, endpoint: &str, query: Option<(&str, &str)>) -> Url {
    let mut url = auth_url.clone();
    let path = format!("{}/{endpoint}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    if let Some((key, value)) = query {
        url.query_pairs_mut().append_pair(key, value);
    }
    url
}

/// A sign-up answers with a full session when email confirmation is off,
/// and with the bare user otherwise.
fn parse_sign_up(body: &str, now: DateTime<Utc>) -> Result<SignUpResult, AuthError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if value.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(value)?;
        return Ok(SignUpResult::Session(Box::new(token.into_session(now)?)));
    }
    let user: UserResponse = serde_json::from_value(value)?;
    Ok(SignUpResult::Pending(user.into_user()))
}

/// Map a non-success response to an [`AuthError`].
fn error_from_response(status: StatusCode, body: &str) -> AuthError {
    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.as_deref().or(parsed.error.as_deref());
    let message = parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .unwrap_or_else(|| format!("HTTP {status}"));

    match code {
        Some("invalid_grant" | "invalid_credentials") => AuthError::InvalidCredentials,
        Some("user_already_exists" | "email_exists") => AuthError::UserAlreadyExists,
        Some("weak_password") => AuthError::WeakPassword(message),
        _ if message.contains("already registered") => AuthError::UserAlreadyExists,
        _ => AuthError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const USER_ID: &str = "2d2c6c4e-8f1a-4b7e-9d3c-51a0e6b7c9f2";

    fn token_body() -> String {
        format!(
            r#"{{
                "access_token": "eyJhbGciOi.access",
                "token_type": "bearer",
                "expires_in": 3600,
                "expires_at": 1760000000,
                "refresh_token": "r3fr3sh",
                "user": {{ "id": "{USER_ID}", "email": "Camille@Maison.Example", "aud": "authenticated" }}
            }}"#
        )
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        // Counted in characters, not bytes
        assert!(validate_password("ééééé").is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let base = Url::parse("https://abcd.supabase.co/auth/v1").unwrap();
        assert_eq!(
            endpoint_url(&base, "token", Some(("grant_type", "password"))).as_str(),
            "https://abcd.supabase.co/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            endpoint_url(&base, "logout", Some(("scope", "local"))).as_str(),
            "https://abcd.supabase.co/auth/v1/logout?scope=local"
        );
    }

    #[test]
    fn test_token_response_into_session() {
        let token: TokenResponse = serde_json::from_str(&token_body()).unwrap();
        let session = token.into_session(Utc::now()).unwrap();

        assert_eq!(session.user.id.to_string(), USER_ID);
        assert_eq!(
            session.user.email.as_ref().map(Email::as_str),
            Some("Camille@maison.example")
        );
        assert_eq!(session.access_token.expose_secret(), "eyJhbGciOi.access");
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_760_000_000);
    }

    #[test]
    fn test_expiry_falls_back_to_expires_in() {
        let now = Utc::now();
        let mut token: TokenResponse = serde_json::from_str(&token_body()).unwrap();
        token.expires_at = None;

        let session = token.into_session(now).unwrap();

        assert_eq!(session.expires_at, Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_parse_sign_up_with_session() {
        let result = parse_sign_up(&token_body(), Utc::now()).unwrap();
        assert!(matches!(result, SignUpResult::Session(_)));
    }

    #[test]
    fn test_parse_sign_up_pending_confirmation() {
        let body = format!(
            r#"{{ "id": "{USER_ID}", "email": "new@maison.example", "confirmation_sent_at": "2025-06-01T10:00:00Z" }}"#
        );
        match parse_sign_up(&body, Utc::now()).unwrap() {
            SignUpResult::Pending(user) => assert_eq!(user.id.to_string(), USER_ID),
            SignUpResult::Session(_) => panic!("expected pending sign-up"),
        }
    }

    #[test]
    fn test_error_mapping_legacy_body() {
        let err = error_from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_error_mapping_coded_body() {
        let err = error_from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#,
        );
        assert!(matches!(err, AuthError::UserAlreadyExists));

        let err = error_from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"weak_password","msg":"Password should contain a digit"}"#,
        );
        assert!(matches!(err, AuthError::WeakPassword(m) if m.contains("digit")));
    }

    #[test]
    fn test_error_mapping_unknown_body() {
        let err = error_from_response(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        match err {
            AuthError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "HTTP 503 Service Unavailable");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::NotSignedIn.to_string(), "not signed in");
        assert_eq!(
            AuthError::RateLimited(60).to_string(),
            "rate limited, retry after 60 seconds"
        );
    }
}
