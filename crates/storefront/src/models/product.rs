//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lumiere_core::{Price, ProductId};

/// A product row.
///
/// Read-only from the cart's point of view; only checkout writes
/// `stock_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Unit price in the store currency.
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    /// Units available for sale.
    pub stock_quantity: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Unit price as a [`Price`].
    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::from_amount(self.price)
    }

    /// Whether `quantity` units can be sold from current stock.
    #[must_use]
    pub const fn has_stock_for(&self, quantity: i32) -> bool {
        quantity <= self.stock_quantity
    }
}

/// Filter for product listings. Results are always newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    /// Only featured (or only non-featured) products.
    pub featured: Option<bool>,
    /// Only products in this category.
    pub category: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl ProductQuery {
    /// Featured products, newest first.
    #[must_use]
    pub const fn featured(limit: usize) -> Self {
        Self {
            featured: Some(true),
            category: None,
            limit: Some(limit),
        }
    }

    /// Products of one category, newest first.
    #[must_use]
    pub fn category(category: impl Into<String>, limit: usize) -> Self {
        Self {
            featured: None,
            category: Some(category.into()),
            limit: Some(limit),
        }
    }

    /// Whether `product` passes the filter (the limit is not considered).
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        self.featured.is_none_or(|f| product.featured == f)
            && self
                .category
                .as_deref()
                .is_none_or(|c| product.category.as_deref() == Some(c))
    }
}
