//! Cart error types.

use thiserror::Error;

use lumiere_core::{CartItemId, ProductId};

use crate::store::StoreError;

/// Errors that can occur during cart operations.
///
/// A failed operation never changes the local cart snapshot.
#[derive(Debug, Error)]
pub enum CartError {
    /// No user is signed in.
    #[error("sign in to use the cart")]
    NotAuthenticated,

    /// The product does not exist (or is hidden from the caller).
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Requested quantity exceeds the product's stock.
    #[error("only {available} of product {product_id} in stock, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// Quantity must be at least 1.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    /// The cart item does not exist or belongs to someone else.
    #[error("cart item not found: {0}")]
    ItemNotFound(CartItemId),

    /// Checkout of an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The record store failed.
    #[error("remote store error: {0}")]
    RemoteStore(#[from] StoreError),
}

impl CartError {
    /// Whether retrying the operation later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::RemoteStore(err) => err.is_transient(),
            _ => false,
        }
    }
}
