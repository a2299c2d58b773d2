//! Application state shared across front ends.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::services::auth::AuthClient;
use crate::services::cart::CartStore;
use crate::services::catalog::Catalog;
use crate::services::checkout::Checkout;
use crate::services::profile::Profiles;
use crate::services::session::Session;
use crate::store::{PostgrestStore, RecordStore};

/// Application state shared across all front ends.
///
/// This struct is cheaply cloneable via `Arc` and wires every service to one
/// HTTP client, one session and one record store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    session: Session,
    auth: AuthClient,
    catalog: Catalog,
    cart: CartStore,
    checkout: Checkout,
    profiles: Profiles,
}

impl AppState {
    /// Create a new application state backed by the hosted API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("lumiere-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let session = Session::new();
        let store: Arc<dyn RecordStore> =
            Arc::new(PostgrestStore::new(&config, http.clone(), session.clone()));
        let auth = AuthClient::new(&config, http, session.clone());

        Ok(Self::with_store(config, store, session, auth))
    }

    /// Create application state around an existing store.
    #[must_use]
    pub fn with_store(
        config: StorefrontConfig,
        store: Arc<dyn RecordStore>,
        session: Session,
        auth: AuthClient,
    ) -> Self {
        let catalog = Catalog::new(Arc::clone(&store));
        let cart = CartStore::new(Arc::clone(&store), session.clone());
        let checkout = Checkout::new(Arc::clone(&store), session.clone(), cart.clone());
        let profiles = Profiles::new(store, session.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                session,
                auth,
                catalog,
                cart,
                checkout,
                profiles,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Get a reference to the authentication client.
    #[must_use]
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the cart.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to checkout.
    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    /// Get a reference to customer profiles.
    #[must_use]
    pub fn profiles(&self) -> &Profiles {
        &self.inner.profiles
    }
}
