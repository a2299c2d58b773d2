//! Remote record store.
//!
//! # Architecture
//!
//! - [`RecordStore`] is the boundary between storefront services and the
//!   hosted tables. Every cart operation is scoped by `user_id`; ownership is
//!   never taken from the caller's word for it.
//! - [`PostgrestStore`] talks to the hosted REST API over HTTP. The backend
//!   is the source of truth; only catalog listings are cached.
//! - [`MemoryStore`] keeps the same tables in process. Used by tests and
//!   local demos; supports failure injection.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumiere_storefront::store::{PostgrestStore, RecordStore};
//!
//! let store = PostgrestStore::new(&config, http, session.clone());
//! let lines = store.cart_lines(user_id).await?;
//! ```

mod memory;
mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use thiserror::Error;

use lumiere_core::{CartItemId, OrderId, ProductId, UserId};

use crate::models::{
    CartItem, CartLine, NewOrder, NewProfile, Order, Product, ProductQuery, Profile, ProfileUpdate,
};

/// Errors that can occur when talking to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API rejected the request.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Backend error code (e.g., a `PostgreSQL` SQLSTATE), if provided.
        code: Option<String>,
        /// Human-readable message.
        message: String,
    },

    /// Row-level security or a missing/expired token rejected the request.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write that should echo the stored row returned nothing.
    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

impl StoreError {
    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) | Self::Unavailable(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Parse(_)
            | Self::PermissionDenied(_)
            | Self::Conflict(_)
            | Self::EmptyResponse(_) => false,
        }
    }
}

/// Per-user scoped access to cart rows and profiles, read access to
/// products, and order persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // =========================================================================
    // Products
    // =========================================================================

    /// Product by ID.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Products matching `query`, newest first.
    async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError>;

    /// Overwrite a product's stock level.
    async fn set_product_stock(&self, id: ProductId, stock: i32) -> Result<(), StoreError>;

    // =========================================================================
    // Cart rows (always scoped to `user_id`)
    // =========================================================================

    /// The user's row for `product_id`, if any.
    async fn cart_item_for_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, StoreError>;

    /// The user's row with ID `item_id`, if it exists and belongs to them.
    async fn cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Option<CartItem>, StoreError>;

    /// Insert a new row. Fails with [`StoreError::Conflict`] if the user
    /// already has a row for `product_id`.
    async fn insert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, StoreError>;

    /// Overwrite the quantity of the user's row. Returns `None` if no row
    /// matched `(item_id, user_id)`.
    async fn update_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, StoreError>;

    /// Delete the user's row. Deleting nothing is not an error.
    async fn delete_cart_item(&self, user_id: UserId, item_id: CartItemId)
    -> Result<(), StoreError>;

    /// Delete every row of the user.
    async fn delete_cart_items(&self, user_id: UserId) -> Result<(), StoreError>;

    /// The user's rows joined with product details, newest first.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// Insert an order and its items.
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// The user's orders with items, newest first.
    async fn orders(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Order>, StoreError>;

    /// Order by ID, scoped to the user.
    async fn order(&self, user_id: UserId, id: OrderId) -> Result<Option<Order>, StoreError>;

    // =========================================================================
    // Profiles
    // =========================================================================

    /// The user's profile, if one was created.
    async fn profile(&self, user_id: UserId) -> Result<Option<Profile>, StoreError>;

    /// Create a profile. Fails with [`StoreError::Conflict`] if it exists.
    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError>;

    /// Apply a partial update. Returns `None` if the user has no profile.
    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError>;
}
