//! Product catalog.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use lumiere_core::ProductId;

use crate::models::{Product, ProductQuery};
use crate::store::{RecordStore, StoreError};

/// Number of products on the featured shelf.
pub const FEATURED_LIMIT: usize = 6;

/// Number of products on a category page.
pub const CATEGORY_LIMIT: usize = 12;

/// Errors that can occur when reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(ProductId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Read-only access to products.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn RecordStore>,
}

impl Catalog {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Product by ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product doesn't exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.store
            .product(id)
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    /// The newest featured products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Store` if the store can't be read.
    #[instrument(skip(self))]
    pub async fn featured(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .store
            .products(&ProductQuery::featured(FEATURED_LIMIT))
            .await?)
    }

    /// The newest products in `category`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Store` if the store can't be read.
    #[instrument(skip(self))]
    pub async fn by_category(&self, category: &str) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .store
            .products(&ProductQuery::category(category, CATEGORY_LIMIT))
            .await?)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}
