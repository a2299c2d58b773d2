//! Unified error handling with Sentry integration.
//!
//! Provides a unified `StorefrontError` type wrapping every subsystem error.
//! Front ends should call [`StorefrontError::report`] before showing
//! [`StorefrontError::user_message`] to the customer.

use thiserror::Error;

use crate::config::ConfigError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::profile::ProfileError;
use crate::store::StoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Profile operation failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Record store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl StorefrontError {
    /// Whether this error points at a bug or outage rather than at the
    /// customer's input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Http(_) | Self::Store(_) => true,
            Self::Auth(err) => matches!(
                err,
                AuthError::Http(_) | AuthError::Parse(_) | AuthError::Api { .. }
            ),
            Self::Cart(CartError::RemoteStore(_))
            | Self::Catalog(CatalogError::Store(_))
            | Self::Checkout(CheckoutError::Cart(CartError::RemoteStore(_)))
            | Self::Profile(ProfileError::Store(_)) => true,
            Self::Cart(_) | Self::Catalog(_) | Self::Checkout(_) | Self::Profile(_) => false,
        }
    }

    /// Capture internal errors to Sentry and log them.
    pub fn report(&self) {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        } else {
            tracing::debug!(error = %self, "Storefront error");
        }
    }

    /// Message safe to show to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) | Self::Http(_) => "The store is not configured correctly".to_string(),
            Self::Store(_)
            | Self::Cart(CartError::RemoteStore(_))
            | Self::Catalog(CatalogError::Store(_))
            | Self::Checkout(CheckoutError::Cart(CartError::RemoteStore(_)))
            | Self::Profile(ProfileError::Store(_)) => {
                "The store is temporarily unavailable, please try again".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::NotSignedIn => "Please sign in".to_string(),
                AuthError::RateLimited(_) => {
                    "Too many attempts, please wait a moment".to_string()
                }
                AuthError::Http(_) | AuthError::Parse(_) | AuthError::Api { .. } => {
                    "Authentication error".to_string()
                }
            },
            Self::Cart(err) | Self::Checkout(CheckoutError::Cart(err)) => match err {
                CartError::NotAuthenticated => "Please sign in to use your cart".to_string(),
                _ => err.to_string(),
            },
            Self::Catalog(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Profile(err) => err.to_string(),
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use lumiere_core::ProductId;

    use super::*;

    #[test]
    fn test_storefront_error_display() {
        let err = StorefrontError::from(CartError::EmptyCart);
        assert_eq!(err.to_string(), "Cart error: cart is empty");

        let err = StorefrontError::from(StoreError::RateLimited(5));
        assert_eq!(err.to_string(), "Store error: Rate limited, retry after 5 seconds");
    }

    #[test]
    fn test_internal_classification() {
        assert!(StorefrontError::from(CartError::RemoteStore(StoreError::Unavailable(
            "down".to_string()
        )))
        .is_internal());
        assert!(!StorefrontError::from(CartError::NotAuthenticated).is_internal());
        assert!(!StorefrontError::from(AuthError::InvalidCredentials).is_internal());
        assert!(!StorefrontError::from(CheckoutError::IncompleteAddress("city")).is_internal());
        assert!(!StorefrontError::from(ProfileError::NotAuthenticated).is_internal());
        assert!(StorefrontError::from(ProfileError::Store(StoreError::RateLimited(1))).is_internal());
    }

    #[test]
    fn test_user_messages_hide_internals() {
        let err = StorefrontError::from(StoreError::Api {
            status: 500,
            code: Some("XX000".to_string()),
            message: "relation \"cart_items\" does not exist".to_string(),
        });
        assert!(!err.user_message().contains("cart_items"));

        let err = StorefrontError::from(CheckoutError::Cart(CartError::NotAuthenticated));
        assert_eq!(err.user_message(), "Please sign in to use your cart");

        let err = StorefrontError::from(CatalogError::NotFound(ProductId::new(uuid::Uuid::nil())));
        assert_eq!(
            err.user_message(),
            "product not found: 00000000-0000-0000-0000-000000000000"
        );
    }
}
