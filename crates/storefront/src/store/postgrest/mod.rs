//! Record store over the hosted REST API.
//!
//! Requests go to `<project>/rest/v1/<table>` with filters encoded as
//! `column=eq.value` query parameters. Every request carries the anon key as
//! `apikey`; the bearer token is the signed-in user's access token (falling
//! back to the anon key), so row-level security sees the real caller.

mod cache;
mod rows;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use lumiere_core::{CartItemId, OrderId, ProductId, UserId};

use super::{RecordStore, StoreError};
use crate::config::StorefrontConfig;
use crate::models::{
    CartItem, CartLine, NewOrder, NewProfile, Order, OrderItem, Product, ProductQuery, Profile,
    ProfileUpdate,
};
use crate::services::session::Session;

use cache::CatalogCache;
use rows::{
    ApiErrorBody, CART_ITEM_COLUMNS, CartItemInsert, CartLineRow, ORDER_SELECT, OrderItemInsert,
    PRODUCT_COLUMNS, ProfilePatch, QuantityPatch, StockPatch, cart_line_select,
    convert_cart_lines,
};

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";

/// SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for insufficient privilege (row-level security).
const INSUFFICIENT_PRIVILEGE: &str = "42501";

// =============================================================================
// PostgrestStore
// =============================================================================

/// [`RecordStore`] backed by the hosted REST API.
#[derive(Clone)]
pub struct PostgrestStore {
    inner: Arc<PostgrestStoreInner>,
}

struct PostgrestStoreInner {
    client: reqwest::Client,
    rest_url: Url,
    anon_key: SecretString,
    session: Session,
    cache: CatalogCache,
}

impl PostgrestStore {
    /// Create a new store client.
    ///
    /// `client` should carry the configured timeout; `session` supplies the
    /// bearer token per request.
    #[must_use]
    pub fn new(config: &StorefrontConfig, client: reqwest::Client, session: Session) -> Self {
        Self {
            inner: Arc::new(PostgrestStoreInner {
                client,
                rest_url: config.supabase.rest_url(),
                anon_key: config.supabase.anon_key.clone(),
                session,
                cache: CatalogCache::new(config.catalog_cache_ttl),
            }),
        }
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Url {
        table_url(&self.inner.rest_url, table, params)
    }

    /// Start a request with auth headers.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .inner
            .session
            .access_token()
            .unwrap_or_else(|| self.inner.anon_key.clone());

        self.inner
            .client
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<String, StoreError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(StoreError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "REST API returned non-success status"
            );
            return Err(error_from_response(status, &body));
        }

        Ok(body)
    }

    /// Send a request that returns a JSON array of rows.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse REST response"
            );
            StoreError::Parse(e)
        })
    }

    /// Fetch at most one row.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, StoreError> {
        Ok(self.fetch(request).await?.into_iter().next())
    }
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("rest_url", &self.inner.rest_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    // =========================================================================
    // Products
    // =========================================================================

    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let url = self.table_url(
            "products",
            &[
                ("select", PRODUCT_COLUMNS.to_string()),
                ("id", eq(id)),
                ("limit", "1".to_string()),
            ],
        );
        self.fetch_one(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self))]
    async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        if let Some(products) = self.inner.cache.get(query).await {
            debug!("Cache hit for product listing");
            return Ok(products);
        }

        let url = self.table_url("products", &product_query_params(query));
        let products: Vec<Product> = self.fetch(self.request(Method::GET, url)).await?;

        self.inner.cache.insert(query.clone(), products.clone()).await;
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn set_product_stock(&self, id: ProductId, stock: i32) -> Result<(), StoreError> {
        let url = self.table_url("products", &[("id", eq(id))]);
        let patch = StockPatch {
            stock_quantity: stock,
            updated_at: Utc::now(),
        };
        self.execute(
            self.request(Method::PATCH, url)
                .header(PREFER, RETURN_MINIMAL)
                .json(&patch),
        )
        .await?;

        // Listings embed stock levels
        self.inner.cache.invalidate();
        Ok(())
    }

    // =========================================================================
    // Cart rows
    // =========================================================================

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn cart_item_for_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, StoreError> {
        let url = self.table_url(
            "cart_items",
            &[
                ("select", CART_ITEM_COLUMNS.to_string()),
                ("user_id", eq(user_id)),
                ("product_id", eq(product_id)),
                ("limit", "1".to_string()),
            ],
        );
        self.fetch_one(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    async fn cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Option<CartItem>, StoreError> {
        let url = self.table_url(
            "cart_items",
            &[
                ("select", CART_ITEM_COLUMNS.to_string()),
                ("id", eq(item_id)),
                ("user_id", eq(user_id)),
                ("limit", "1".to_string()),
            ],
        );
        self.fetch_one(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn insert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, StoreError> {
        let url = self.table_url("cart_items", &[("select", CART_ITEM_COLUMNS.to_string())]);
        let row = CartItemInsert {
            user_id,
            product_id,
            quantity,
        };
        self.fetch_one(
            self.request(Method::POST, url)
                .header(PREFER, RETURN_REPRESENTATION)
                .json(&row),
        )
        .await?
        .ok_or_else(|| StoreError::EmptyResponse("cart_items insert".to_string()))
    }

    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    async fn update_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, StoreError> {
        let url = self.table_url(
            "cart_items",
            &[
                ("select", CART_ITEM_COLUMNS.to_string()),
                ("id", eq(item_id)),
                ("user_id", eq(user_id)),
            ],
        );
        self.fetch_one(
            self.request(Method::PATCH, url)
                .header(PREFER, RETURN_REPRESENTATION)
                .json(&QuantityPatch { quantity }),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    async fn delete_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), StoreError> {
        let url = self.table_url("cart_items", &[("id", eq(item_id)), ("user_id", eq(user_id))]);
        self.execute(self.request(Method::DELETE, url).header(PREFER, RETURN_MINIMAL))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_cart_items(&self, user_id: UserId) -> Result<(), StoreError> {
        let url = self.table_url("cart_items", &[("user_id", eq(user_id))]);
        self.execute(self.request(Method::DELETE, url).header(PREFER, RETURN_MINIMAL))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        let url = self.table_url(
            "cart_items",
            &[
                ("select", cart_line_select()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
            ],
        );
        let rows: Vec<CartLineRow> = self.fetch(self.request(Method::GET, url)).await?;
        Ok(convert_cart_lines(rows))
    }

    // =========================================================================
    // Orders
    // =========================================================================

    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let url = self.table_url("orders", &[("select", "*".to_string())]);
        let mut created: Order = self
            .fetch_one(
                self.request(Method::POST, url)
                    .header(PREFER, RETURN_REPRESENTATION)
                    .json(&order),
            )
            .await?
            .ok_or_else(|| StoreError::EmptyResponse("orders insert".to_string()))?;

        if !order.items.is_empty() {
            let items: Vec<OrderItemInsert> = order
                .items
                .iter()
                .map(|item| OrderItemInsert::new(created.id, item))
                .collect();
            let url = self.table_url("order_items", &[("select", "*".to_string())]);
            created.items = self
                .fetch::<OrderItem>(
                    self.request(Method::POST, url)
                        .header(PREFER, RETURN_REPRESENTATION)
                        .json(&items),
                )
                .await?;
        }

        Ok(created)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn orders(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let url = self.table_url(
            "orders",
            &[
                ("select", ORDER_SELECT.to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        );
        self.fetch(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, order_id = %id))]
    async fn order(&self, user_id: UserId, id: OrderId) -> Result<Option<Order>, StoreError> {
        let url = self.table_url(
            "orders",
            &[
                ("select", ORDER_SELECT.to_string()),
                ("id", eq(id)),
                ("user_id", eq(user_id)),
                ("limit", "1".to_string()),
            ],
        );
        self.fetch_one(self.request(Method::GET, url)).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn profile(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> {
        let url = self.table_url(
            "profiles",
            &[
                ("select", "*".to_string()),
                ("id", eq(user_id)),
                ("limit", "1".to_string()),
            ],
        );
        self.fetch_one(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        let url = self.table_url("profiles", &[("select", "*".to_string())]);
        self.fetch_one(
            self.request(Method::POST, url)
                .header(PREFER, RETURN_REPRESENTATION)
                .json(&profile),
        )
        .await?
        .ok_or_else(|| StoreError::EmptyResponse("profiles insert".to_string()))
    }

    #[instrument(skip(self, update), fields(user_id = %user_id))]
    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError> {
        let url = self.table_url(
            "profiles",
            &[("select", "*".to_string()), ("id", eq(user_id))],
        );
        let patch = ProfilePatch {
            update,
            updated_at: Utc::now(),
        };
        self.fetch_one(
            self.request(Method::PATCH, url)
                .header(PREFER, RETURN_REPRESENTATION)
                .json(&patch),
        )
        .await
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// `eq.<value>` filter operand.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// `<rest_url>/<table>?<params>`.
fn table_url(rest_url: &Url, table: &str, params: &[(&str, String)]) -> Url {
    let mut url = rest_url.clone();
    let path = format!("{}/{table}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    if !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }
    url
}

/// Query parameters for a product listing.
fn product_query_params(query: &ProductQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", PRODUCT_COLUMNS.to_string())];
    if let Some(featured) = query.featured {
        params.push(("featured", eq(featured)));
    }
    if let Some(category) = &query.category {
        params.push(("category", eq(category)));
    }
    params.push(("order", "created_at.desc".to_string()));
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

/// Map a non-success response to a [`StoreError`].
fn error_from_response(status: StatusCode, body: &str) -> StoreError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();

    let code = parsed.as_ref().and_then(|b| b.code.clone());
    let message = parsed
        .as_ref()
        .and_then(|b| {
            let mut parts: Vec<&str> = Vec::new();
            parts.extend(b.message.as_deref());
            parts.extend(b.details.as_deref());
            parts.extend(b.hint.as_deref());
            (!parts.is_empty()).then(|| parts.join(" - "))
        })
        .unwrap_or_else(|| format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()));

    match (status, code.as_deref()) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) | (_, Some(INSUFFICIENT_PRIVILEGE)) => {
            StoreError::PermissionDenied(message)
        }
        (StatusCode::CONFLICT, _) | (_, Some(UNIQUE_VIOLATION)) => StoreError::Conflict(message),
        _ => StoreError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    }
}
