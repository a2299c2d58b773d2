//! Cart types.
//!
//! [`CartItem`] is the persisted `(user, product, quantity)` row;
//! [`CartLine`] is the same row joined with its product for display;
//! [`CartSnapshot`] is the local, render-friendly view that the cart
//! publishes to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lumiere_core::{CartItemId, Price, ProductId, UserId};

use super::product::Product;

/// A persisted cart row. At most one row exists per `(user_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Always at least 1.
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with its product details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product: Product,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    /// `quantity × unit price`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.unit_price().times(self.quantity)
    }
}

/// Local cart state as last loaded from the record store.
///
/// Totals are derived on every call rather than cached, so they can never
/// drift from `lines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Owner of the lines, `None` while signed out.
    pub user_id: Option<UserId>,
    /// Cart lines, newest first.
    pub lines: Vec<CartLine>,
    /// True until the first load (or clear) for the current session settles.
    pub loading: bool,
}

impl CartSnapshot {
    /// Initial state before anything has been loaded.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            user_id: None,
            lines: Vec::new(),
            loading: true,
        }
    }

    /// Settled, empty cart for `user_id`.
    #[must_use]
    pub const fn empty(user_id: Option<UserId>) -> Self {
        Self {
            user_id,
            lines: Vec::new(),
            loading: false,
        }
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.quantity)).sum()
    }

    /// Sum of `quantity × unit price` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line by cart item id.
    #[must_use]
    pub fn line(&self, id: CartItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    /// Line holding `product_id`, if the product is in the cart.
    #[must_use]
    pub fn line_for_product(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product.id == product_id)
    }
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}
