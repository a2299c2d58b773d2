//! Integration tests for the Lumière storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p lumiere-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync` - Cart operations against the in-memory record store
//! - `session_follow` - Cart reacting to sign-in and sign-out
//! - `checkout` - Order placement end to end
//!
//! Every test runs the real services over [`MemoryStore`]; nothing here
//! talks to the network.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use url::Url;

use lumiere_core::{ProductId, UserId};
use lumiere_storefront::config::{StorefrontConfig, SupabaseConfig};
use lumiere_storefront::models::{Address, AuthSession, AuthUser, Product};
use lumiere_storefront::services::auth::AuthClient;
use lumiere_storefront::services::session::Session;
use lumiere_storefront::state::AppState;
use lumiere_storefront::store::{MemoryStore, RecordStore};

/// Services wired over an in-memory store.
pub struct TestContext {
    pub state: AppState,
    pub store: MemoryStore,
}

impl TestContext {
    /// Fresh context with an empty store and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        let config = test_config();
        let store = MemoryStore::new();
        let session = Session::new();
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .expect("test HTTP client");
        let auth = AuthClient::new(&config, http, session.clone());
        let shared: Arc<dyn RecordStore> = Arc::new(store.clone());

        Self {
            state: AppState::with_store(config, shared, session, auth),
            store,
        }
    }

    /// Insert a product and return it.
    pub async fn product(&self, name: &str, price_cents: i64, stock: i32) -> Product {
        let product = Product {
            id: ProductId::generate(),
            name: name.to_string(),
            description: None,
            price: Decimal::new(price_cents, 2),
            category: Some("skincare".to_string()),
            image_url: None,
            featured: false,
            stock_quantity: stock,
            created_at: None,
        };
        self.store.insert_product(product.clone()).await;
        product
    }

    /// Publish a session for `user_id`, as a successful sign-in would.
    pub fn sign_in(&self, user_id: UserId) {
        self.state.session().set(AuthSession {
            user: AuthUser {
                id: user_id,
                email: None,
            },
            access_token: SecretString::from(format!("access-{user_id}")),
            refresh_token: SecretString::from(format!("refresh-{user_id}")),
            expires_at: None,
        });
    }

    /// Sign in as a brand-new user and return their ID.
    pub fn sign_in_new_user(&self) -> UserId {
        let user_id = UserId::generate();
        self.sign_in(user_id);
        user_id
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration that points at a closed local port. The in-memory store
/// never uses it; auth calls fail fast with a connection error.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        supabase: SupabaseConfig {
            url: Url::parse("http://127.0.0.1:9").expect("static test URL"),
            anon_key: SecretString::from("test-anon-key"),
        },
        http_timeout: Duration::from_secs(5),
        catalog_cache_ttl: Duration::from_secs(60),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A complete shipping address.
#[must_use]
pub fn address() -> Address {
    Address {
        street: "31 Rue Cambon".to_string(),
        city: "Paris".to_string(),
        state: "IDF".to_string(),
        postal_code: "75001".to_string(),
        country: "FR".to_string(),
    }
}
