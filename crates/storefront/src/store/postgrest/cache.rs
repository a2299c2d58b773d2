//! Cache for catalog listings.
//!
//! Only product listings are cached. Single-product lookups feed stock
//! checks and always go to the backend.

use std::time::Duration;

use moka::future::Cache;

use crate::models::{Product, ProductQuery};

const MAX_CACHED_QUERIES: u64 = 500;

/// Listing results keyed by the query that produced them.
#[derive(Clone)]
pub(super) struct CatalogCache {
    listings: Cache<ProductQuery, Vec<Product>>,
}

impl CatalogCache {
    pub(super) fn new(ttl: Duration) -> Self {
        Self {
            listings: Cache::builder()
                .max_capacity(MAX_CACHED_QUERIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub(super) async fn get(&self, query: &ProductQuery) -> Option<Vec<Product>> {
        self.listings.get(query).await
    }

    pub(super) async fn insert(&self, query: ProductQuery, products: Vec<Product>) {
        self.listings.insert(query, products).await;
    }

    /// Drop every listing (stock levels changed).
    pub(super) fn invalidate(&self) {
        self.listings.invalidate_all();
    }
}
