//! In-process record store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use lumiere_core::{CartItemId, OrderId, OrderItemId, ProductId, UserId};

use super::{RecordStore, StoreError};
use crate::models::{
    CartItem, CartLine, NewOrder, NewProfile, Order, OrderItem, Product, ProductQuery, Profile,
    ProfileUpdate,
};

/// Record store held in memory.
///
/// Mirrors the hosted tables closely enough for the storefront services:
/// one cart row per `(user, product)`, user-scoped updates and deletes,
/// newest-first listings. Call [`MemoryStore::fail_next`] to make the next
/// operations fail with [`StoreError::Unavailable`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    passes_before_failure: Arc<AtomicUsize>,
    pending_failures: Arc<AtomicUsize>,
}

#[derive(Default)]
struct Tables {
    /// Insertion order doubles as `created_at` order.
    products: Vec<Product>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    profiles: Vec<Profile>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product.
    pub async fn insert_product(&self, product: Product) {
        let mut tables = self.tables.write().await;
        tables.products.retain(|p| p.id != product.id);
        tables.products.push(product);
    }

    /// Current stock of a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<i32> {
        let tables = self.tables.read().await;
        tables
            .products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.stock_quantity)
    }

    /// Raw cart rows of a user, in insertion order.
    pub async fn cart_rows(&self, user_id: UserId) -> Vec<CartItem> {
        let tables = self.tables.read().await;
        tables
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Make the next `count` operations fail.
    pub fn fail_next(&self, count: usize) {
        self.fail_after(0, count);
    }

    /// Let `skip` operations succeed, then fail the following `count`.
    pub fn fail_after(&self, skip: usize, count: usize) {
        self.passes_before_failure.store(skip, Ordering::SeqCst);
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        let passed = self
            .passes_before_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if passed {
            return Ok(());
        }

        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl Tables {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.check_failure()?;
        Ok(self.tables.read().await.product(id).cloned())
    }

    async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .rev()
            .filter(|p| query.matches(p))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn set_product_stock(&self, id: ProductId, stock: i32) -> Result<(), StoreError> {
        self.check_failure()?;
        let mut tables = self.tables.write().await;
        if let Some(product) = tables.products.iter_mut().find(|p| p.id == id) {
            product.stock_quantity = stock;
        }
        Ok(())
    }

    async fn cart_item_for_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, StoreError> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .iter()
            .find(|item| item.user_id == user_id && item.product_id == product_id)
            .cloned())
    }

    async fn cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Option<CartItem>, StoreError> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .iter()
            .find(|item| item.id == item_id && item.user_id == user_id)
            .cloned())
    }

    async fn insert_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, StoreError> {
        self.check_failure()?;
        let mut tables = self.tables.write().await;
        if tables
            .cart_items
            .iter()
            .any(|item| item.user_id == user_id && item.product_id == product_id)
        {
            return Err(StoreError::Conflict(format!(
                "cart item for product {product_id} already exists"
            )));
        }
        if tables.product(product_id).is_none() {
            return Err(StoreError::Api {
                status: 409,
                code: Some("23503".to_string()),
                message: format!("product {product_id} does not exist"),
            });
        }

        let item = CartItem {
            id: CartItemId::generate(),
            user_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        };
        tables.cart_items.push(item.clone());
        Ok(item)
    }

    async fn update_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, StoreError> {
        self.check_failure()?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .cart_items
            .iter_mut()
            .find(|item| item.id == item_id && item.user_id == user_id)
            .map(|item| {
                item.quantity = quantity;
                item.clone()
            }))
    }

    async fn delete_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), StoreError> {
        self.check_failure()?;
        self.tables
            .write()
            .await
            .cart_items
            .retain(|item| !(item.id == item_id && item.user_id == user_id));
        Ok(())
    }

    async fn delete_cart_items(&self, user_id: UserId) -> Result<(), StoreError> {
        self.check_failure()?;
        self.tables
            .write()
            .await
            .cart_items
            .retain(|item| item.user_id != user_id);
        Ok(())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .iter()
            .rev()
            .filter(|item| item.user_id == user_id)
            .filter_map(|item| {
                tables.product(item.product_id).map(|product| CartLine {
                    id: item.id,
                    product: product.clone(),
                    quantity: item.quantity,
                    created_at: item.created_at,
                })
            })
            .collect())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.check_failure()?;
        let id = OrderId::generate();
        let items = order
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: OrderItemId::generate(),
                order_id: id,
                product_id: item.product_id,
                quantity: item.quantity,
                price_at_time: item.price_at_time,
            })
            .collect();

        let created = Order {
            id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            shipping_method: order.shipping_method,
            tracking_number: None,
            notes: order.notes,
            created_at: Utc::now(),
            items,
        };
        self.tables.write().await.orders.push(created.clone());
        Ok(created)
    }

    async fn orders(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Order>, StoreError> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .rev()
            .filter(|order| order.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn order(&self, user_id: UserId, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|order| order.id == id && order.user_id == user_id)
            .cloned())
    }

    async fn profile(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().find(|p| p.id == user_id).cloned())
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        self.check_failure()?;
        let mut tables = self.tables.write().await;
        if tables.profiles.iter().any(|p| p.id == profile.id) {
            return Err(StoreError::Conflict(format!(
                "profile for user {} already exists",
                profile.id
            )));
        }

        let now = Utc::now();
        let created = Profile {
            id: profile.id,
            email: profile.email,
            full_name: None,
            phone: None,
            shipping_address: None,
            billing_address: None,
            preferences: profile.preferences,
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.profiles.push(created.clone());
        Ok(created)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError> {
        self.check_failure()?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .profiles
            .iter_mut()
            .find(|p| p.id == user_id)
            .map(|profile| {
                update.apply_to(profile);
                profile.updated_at = Some(Utc::now());
                profile.clone()
            }))
    }
}
