//! Cart synchronizer.
//!
//! [`CartStore`] keeps a local [`CartSnapshot`] consistent with the signed-in
//! user's rows in the record store. Every mutation is a single upsert or
//! delete against the store followed by a full reload; nothing is merged
//! optimistically, so the snapshot only ever shows what the store returned.
//!
//! # Example
//!
//! ```rust,ignore
//! let cart = CartStore::new(store, session);
//! let _follower = cart.spawn_session_sync();
//!
//! cart.add(product_id, 2).await?;
//! println!("{} items, {}", cart.total_items(), cart.total_price());
//! ```

mod error;

pub use error::CartError;

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use lumiere_core::{CartItemId, Price, ProductId, UserId};

use crate::models::{CartSnapshot, Product};
use crate::services::session::Session;
use crate::store::{RecordStore, StoreError};

/// Cart state shared by every clone.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    store: Arc<dyn RecordStore>,
    session: Session,
    state: watch::Sender<CartSnapshot>,
}

impl CartStore {
    /// Create a cart in its initial (loading) state.
    ///
    /// Nothing is fetched until [`CartStore::reload`] is called or the
    /// session follower is started.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, session: Session) -> Self {
        let (state, _rx) = watch::channel(CartSnapshot::initial());
        Self {
            inner: Arc::new(CartStoreInner {
                store,
                session,
                state,
            }),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.state.subscribe()
    }

    /// Sum of quantities in the current snapshot.
    #[must_use]
    pub fn total_items(&self) -> i64 {
        self.inner.state.borrow().total_items()
    }

    /// Sum of line totals in the current snapshot.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.inner.state.borrow().total_price()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of a product.
    ///
    /// If the product is already in the cart its quantity is increased;
    /// otherwise a new row is inserted.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` if nobody is signed in.
    /// Returns `CartError::InvalidQuantity` if `quantity` is not positive.
    /// Returns `CartError::ProductNotFound` if the product doesn't exist.
    /// Returns `CartError::InsufficientStock` if stock can't cover the
    /// requested (or merged) quantity.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: ProductId, quantity: i32) -> Result<(), CartError> {
        let user_id = self.require_user()?;
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let product = self.product(product_id).await?;
        check_stock(&product, quantity)?;

        let existing = self
            .inner
            .store
            .cart_item_for_product(user_id, product_id)
            .await
            .map_err(|e| remote_failure("add", e))?;

        if let Some(item) = existing {
            let merged = item.quantity.saturating_add(quantity);
            return self.update(item.id, merged).await;
        }

        self.inner
            .store
            .insert_cart_item(user_id, product_id, quantity)
            .await
            .map_err(|e| remote_failure("add", e))?;

        tracing::info!(user_id = %user_id, quantity, "Added to cart");
        self.reload().await
    }

    /// Set the quantity of a cart item. A quantity of zero or less removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` if nobody is signed in.
    /// Returns `CartError::ItemNotFound` if the item isn't in the user's cart.
    /// Returns `CartError::InsufficientStock` if stock can't cover `quantity`.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update(&self, item_id: CartItemId, quantity: i32) -> Result<(), CartError> {
        let user_id = self.require_user()?;
        if quantity <= 0 {
            return self.remove(item_id).await;
        }

        let item = self
            .inner
            .store
            .cart_item(user_id, item_id)
            .await
            .map_err(|e| remote_failure("update", e))?
            .ok_or(CartError::ItemNotFound(item_id))?;

        let product = self.product(item.product_id).await?;
        check_stock(&product, quantity)?;

        self.inner
            .store
            .update_cart_quantity(user_id, item_id, quantity)
            .await
            .map_err(|e| remote_failure("update", e))?
            .ok_or(CartError::ItemNotFound(item_id))?;

        tracing::info!(user_id = %user_id, quantity, "Updated cart quantity");
        self.reload().await
    }

    /// Remove a cart item. Removing an unknown item is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` if nobody is signed in.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: CartItemId) -> Result<(), CartError> {
        let user_id = self.require_user()?;

        self.inner
            .store
            .delete_cart_item(user_id, item_id)
            .await
            .map_err(|e| remote_failure("remove", e))?;

        tracing::info!(user_id = %user_id, "Removed from cart");
        self.reload().await
    }

    /// Remove every item from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` if nobody is signed in.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        let user_id = self.require_user()?;

        self.inner
            .store
            .delete_cart_items(user_id)
            .await
            .map_err(|e| remote_failure("clear", e))?;

        self.inner
            .state
            .send_replace(CartSnapshot::empty(Some(user_id)));
        tracing::info!(user_id = %user_id, "Cleared cart");
        Ok(())
    }

    /// Replace the snapshot with the user's rows as stored remotely.
    ///
    /// When signed out the snapshot becomes an empty cart. A result that
    /// arrives after the signed-in user changed is discarded.
    ///
    /// # Errors
    ///
    /// Returns `CartError::RemoteStore` if the rows can't be fetched.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<(), CartError> {
        let Some(user_id) = self.inner.session.current_user() else {
            self.inner.state.send_replace(CartSnapshot::empty(None));
            return Ok(());
        };

        let lines = self
            .inner
            .store
            .cart_lines(user_id)
            .await
            .map_err(|e| remote_failure("reload", e))?;

        if self.inner.session.current_user() != Some(user_id) {
            tracing::debug!(user_id = %user_id, "Session changed during reload, result discarded");
            return Ok(());
        }

        tracing::debug!(user_id = %user_id, lines = lines.len(), "Cart reloaded");
        self.inner.state.send_replace(CartSnapshot {
            user_id: Some(user_id),
            lines,
            loading: false,
        });
        Ok(())
    }

    // =========================================================================
    // Session following
    // =========================================================================

    /// Spawn a task that keeps the cart in step with the session.
    ///
    /// Signing out empties the snapshot; signing in (as a different user)
    /// resets it and reloads. Token refreshes for the same user are
    /// ignored. The task only holds a weak reference to the cart, so it
    /// ends once every clone of the cart and of the session is dropped.
    #[must_use = "dropping the handle detaches the task"]
    pub fn spawn_session_sync(&self) -> JoinHandle<()> {
        let cart = Arc::downgrade(&self.inner);
        let mut rx = self.inner.session.subscribe();

        tokio::spawn(async move {
            let mut current = rx.borrow_and_update().as_ref().map(|s| s.user.id);
            if !follow_weak(&cart, current).await {
                tracing::debug!("Cart dropped, cart follower stopped");
                return;
            }

            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().as_ref().map(|s| s.user.id);
                if next == current {
                    continue;
                }
                current = next;
                if !follow_weak(&cart, next).await {
                    tracing::debug!("Cart dropped, cart follower stopped");
                    return;
                }
            }

            tracing::debug!("Session closed, cart follower stopped");
        })
    }

    async fn follow(&self, user_id: Option<UserId>) {
        let Some(user_id) = user_id else {
            self.inner.state.send_replace(CartSnapshot::empty(None));
            return;
        };

        self.inner.state.send_replace(CartSnapshot {
            user_id: Some(user_id),
            lines: Vec::new(),
            loading: true,
        });

        if let Err(e) = self.reload().await {
            tracing::warn!(user_id = %user_id, error = %e, "Cart load after sign-in failed");
            self.inner.state.send_if_modified(|snapshot| {
                let settle = snapshot.user_id == Some(user_id) && snapshot.loading;
                if settle {
                    snapshot.loading = false;
                }
                settle
            });
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn require_user(&self) -> Result<UserId, CartError> {
        self.inner
            .session
            .current_user()
            .ok_or(CartError::NotAuthenticated)
    }

    async fn product(&self, product_id: ProductId) -> Result<Product, CartError> {
        self.inner
            .store
            .product(product_id)
            .await
            .map_err(|e| remote_failure("product lookup", e))?
            .ok_or(CartError::ProductNotFound(product_id))
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.inner.state.borrow();
        f.debug_struct("CartStore")
            .field("user_id", &snapshot.user_id)
            .field("lines", &snapshot.lines.len())
            .field("loading", &snapshot.loading)
            .finish_non_exhaustive()
    }
}

/// Follow `user_id` if the cart is still alive. Returns `false` once it
/// has been dropped.
async fn follow_weak(cart: &Weak<CartStoreInner>, user_id: Option<UserId>) -> bool {
    let Some(inner) = cart.upgrade() else {
        return false;
    };
    CartStore { inner }.follow(user_id).await;
    true
}

/// Log a store failure and wrap it.
fn remote_failure(operation: &'static str, err: StoreError) -> CartError {
    tracing::error!(operation, error = %err, transient = err.is_transient(), "Cart store operation failed");
    CartError::RemoteStore(err)
}

fn check_stock(product: &Product, requested: i32) -> Result<(), CartError> {
    if product.has_stock_for(requested) {
        Ok(())
    } else {
        Err(CartError::InsufficientStock {
            product_id: product.id,
            requested,
            available: product.stock_quantity,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use super::*;
    use crate::models::{AuthSession, AuthUser};
    use crate::store::MemoryStore;

    fn product(name: &str, price: Decimal, stock: i32) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            description: None,
            price,
            category: Some("skincare".to_string()),
            image_url: None,
            featured: false,
            stock_quantity: stock,
            created_at: None,
        }
    }

    fn sign_in(session: &Session, user_id: UserId) {
        session.set(AuthSession {
            user: AuthUser {
                id: user_id,
                email: None,
            },
            access_token: SecretString::from("access"),
            refresh_token: SecretString::from("refresh"),
            expires_at: None,
        });
    }

    async fn setup() -> (CartStore, MemoryStore, Session, Product) {
        let store = MemoryStore::new();
        let serum = product("Rose Serum", Decimal::new(8_500, 2), 10);
        store.insert_product(serum.clone()).await;
        let session = Session::new();
        sign_in(&session, UserId::generate());
        let cart = CartStore::new(Arc::new(store.clone()), session.clone());
        (cart, store, session, serum)
    }

    #[tokio::test]
    async fn test_add_update_remove_scenario() {
        let (cart, _store, _session, serum) = setup().await;

        cart.add(serum.id, 2).await.unwrap();
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.total_price().amount, Decimal::new(17_000, 2));

        cart.add(serum.id, 3).await.unwrap();
        let snapshot = cart.snapshot();
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].quantity, 5);
        assert_eq!(cart.total_price().amount, Decimal::new(42_500, 2));

        let item_id = snapshot.lines[0].id;
        cart.update(item_id, 1).await.unwrap();
        assert_eq!(cart.total_items(), 1);

        cart.remove(item_id).await.unwrap();
        assert!(cart.snapshot().is_empty());
        assert_eq!(cart.total_price().amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_mutations_require_sign_in() {
        let (cart, store, session, serum) = setup().await;
        session.clear();

        assert!(matches!(
            cart.add(serum.id, 1).await,
            Err(CartError::NotAuthenticated)
        ));
        assert!(matches!(cart.clear().await, Err(CartError::NotAuthenticated)));
        assert!(matches!(
            cart.update(CartItemId::generate(), 1).await,
            Err(CartError::NotAuthenticated)
        ));
        assert_eq!(store.stock_of(serum.id).await, Some(10));
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let (cart, _store, _session, _serum) = setup().await;
        let missing = ProductId::generate();

        let err = cart.add(missing, 1).await.unwrap_err();

        assert!(matches!(err, CartError::ProductNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_add_rejects_non_positive_quantity() {
        let (cart, _store, _session, serum) = setup().await;

        assert!(matches!(
            cart.add(serum.id, 0).await,
            Err(CartError::InvalidQuantity(0))
        ));
        assert!(matches!(
            cart.add(serum.id, -2).await,
            Err(CartError::InvalidQuantity(-2))
        ));
    }

    #[tokio::test]
    async fn test_merged_quantity_is_stock_checked() {
        let (cart, _store, _session, serum) = setup().await;
        cart.add(serum.id, 8).await.unwrap();

        let err = cart.add(serum.id, 3).await.unwrap_err();

        assert!(matches!(
            err,
            CartError::InsufficientStock {
                requested: 11,
                available: 10,
                ..
            }
        ));
        assert_eq!(cart.total_items(), 8);
    }

    #[tokio::test]
    async fn test_update_to_zero_removes() {
        let (cart, store, session, serum) = setup().await;
        cart.add(serum.id, 2).await.unwrap();
        let item_id = cart.snapshot().lines[0].id;

        cart.update(item_id, 0).await.unwrap();

        assert!(cart.snapshot().is_empty());
        let user_id = session.current_user().unwrap();
        assert!(store.cart_rows(user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_to_negative_removes() {
        let (cart, store, session, serum) = setup().await;
        cart.add(serum.id, 2).await.unwrap();
        let item_id = cart.snapshot().lines[0].id;

        cart.update(item_id, -3).await.unwrap();

        assert!(cart.snapshot().is_empty());
        assert_eq!(cart.total_items(), 0);
        let user_id = session.current_user().unwrap();
        assert!(store.cart_rows(user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_foreign_item_is_not_found() {
        let (cart, store, _session, serum) = setup().await;
        let stranger = UserId::generate();
        let foreign = store.insert_cart_item(stranger, serum.id, 1).await.unwrap();

        let err = cart.update(foreign.id, 4).await.unwrap_err();

        assert!(matches!(err, CartError::ItemNotFound(id) if id == foreign.id));
        assert_eq!(store.cart_rows(stranger).await[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_item_is_noop() {
        let (cart, _store, _session, serum) = setup().await;
        cart.add(serum.id, 1).await.unwrap();

        cart.remove(CartItemId::generate()).await.unwrap();

        assert_eq!(cart.total_items(), 1);
    }

    #[tokio::test]
    async fn test_clear_resets_directly() {
        let (cart, store, session, serum) = setup().await;
        cart.add(serum.id, 2).await.unwrap();

        cart.clear().await.unwrap();

        let snapshot = cart.snapshot();
        assert!(snapshot.is_empty());
        assert!(!snapshot.loading);
        assert!(store.cart_rows(session.current_user().unwrap()).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_leaves_snapshot_unchanged() {
        let (cart, store, _session, serum) = setup().await;
        cart.add(serum.id, 2).await.unwrap();
        let before = cart.snapshot();

        store.fail_next(1);
        let err = cart.add(serum.id, 1).await.unwrap_err();

        assert!(matches!(err, CartError::RemoteStore(StoreError::Unavailable(_))));
        assert!(err.is_transient());
        assert_eq!(cart.snapshot(), before);
    }

    #[tokio::test]
    async fn test_reload_when_signed_out_empties() {
        let (cart, _store, session, serum) = setup().await;
        cart.add(serum.id, 1).await.unwrap();
        session.clear();

        cart.reload().await.unwrap();

        let snapshot = cart.snapshot();
        assert!(snapshot.is_empty());
        assert!(snapshot.user_id.is_none());
    }

    #[tokio::test]
    async fn test_session_sync_follows_sign_out_and_sign_in() {
        let (cart, _store, session, serum) = setup().await;
        let first_user = session.current_user().unwrap();
        cart.add(serum.id, 3).await.unwrap();

        let follower = cart.spawn_session_sync();
        let mut rx = cart.subscribe();

        session.clear();
        tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|s| s.user_id.is_none() && !s.loading),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(cart.snapshot().is_empty());

        sign_in(&session, first_user);
        let snapshot = tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|s| s.user_id == Some(first_user) && !s.loading),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(snapshot.total_items(), 3);

        follower.abort();
    }

    #[tokio::test]
    async fn test_session_sync_stops_when_cart_and_session_dropped() {
        let (cart, _store, session, _serum) = setup().await;
        let mut rx = cart.subscribe();
        let follower = cart.spawn_session_sync();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| !s.loading))
            .await
            .unwrap()
            .unwrap();

        drop(cart);
        drop(session);

        tokio::time::timeout(Duration::from_millis(500), follower)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_session_sync_keeps_running_while_cart_alive() {
        let (cart, _store, session, _serum) = setup().await;
        let follower = cart.spawn_session_sync();

        drop(session);
        tokio::task::yield_now().await;

        assert!(!follower.is_finished());
        follower.abort();
    }
}
