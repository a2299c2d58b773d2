//! Checkout and order history.
//!
//! Placing an order turns the signed-in user's cart into an `orders` row
//! plus one `order_items` row per line, priced at the moment of checkout.
//! Stock is then decremented per product and the cart is emptied.
//! Addresses left out of the request come from the customer's profile.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use lumiere_core::{OrderId, OrderStatus, UserId};

use crate::error::add_breadcrumb;
use crate::models::{Address, CartSnapshot, NewOrder, NewOrderItem, Order};
use crate::services::cart::{CartError, CartStore};
use crate::services::session::Session;
use crate::store::{RecordStore, StoreError};

/// Orders returned by [`Checkout::history`] when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Neither the request nor the profile has a shipping address.
    #[error("a shipping address is required")]
    AddressRequired,

    /// A required address field is blank.
    #[error("address is missing {0}")]
    IncompleteAddress(&'static str),

    /// The order doesn't exist or belongs to someone else.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Cart, session or store failure.
    #[error(transparent)]
    Cart(#[from] CartError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        Self::Cart(CartError::RemoteStore(err))
    }
}

/// What the customer submits at checkout.
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    pub shipping_method: String,
    /// Defaults to the profile's shipping address.
    pub shipping_address: Option<Address>,
    /// Defaults to the profile's billing address, then to the shipping
    /// address.
    pub billing_address: Option<Address>,
    pub notes: Option<String>,
}

/// Order placement and history for the signed-in user.
#[derive(Clone)]
pub struct Checkout {
    store: Arc<dyn RecordStore>,
    session: Session,
    cart: CartStore,
}

impl Checkout {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, session: Session, cart: CartStore) -> Self {
        Self {
            store,
            session,
            cart,
        }
    }

    /// Place an order for everything in the cart.
    ///
    /// The cart is reloaded first so stock and prices are current. Stock
    /// decrements are plain overwrites; concurrent checkouts of the same
    /// product can oversell.
    ///
    /// The order is created before stock is decremented and the cart is
    /// cleared. If either of those later steps fails the error is returned
    /// but the order stays placed (its ID is logged); placing again would
    /// create a second order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::AddressRequired` if no shipping address is known.
    /// Returns `CheckoutError::IncompleteAddress` if an address field is blank.
    /// Returns `CartError::NotAuthenticated` if nobody is signed in.
    /// Returns `CartError::EmptyCart` if there is nothing to order.
    /// Returns `CartError::InsufficientStock` if a line exceeds current stock.
    #[instrument(skip(self, request), fields(shipping_method = %request.shipping_method))]
    pub async fn place_order(&self, request: CheckoutRequest) -> Result<Order, CheckoutError> {
        let user_id = self.require_user()?;

        let (shipping_address, billing_address) = self.resolve_addresses(user_id, &request).await?;
        for address in [&shipping_address, &billing_address] {
            if let Some(field) = address.missing_field() {
                return Err(CheckoutError::IncompleteAddress(field));
            }
        }

        self.cart.reload().await?;
        let snapshot = self.cart.snapshot();
        if snapshot.is_empty() {
            return Err(CartError::EmptyCart.into());
        }

        for line in &snapshot.lines {
            if !line.product.has_stock_for(line.quantity) {
                return Err(CartError::InsufficientStock {
                    product_id: line.product.id,
                    requested: line.quantity,
                    available: line.product.stock_quantity,
                }
                .into());
            }
        }

        let order = NewOrder {
            user_id,
            status: OrderStatus::Pending,
            total_amount: snapshot.total_price().amount,
            shipping_address,
            billing_address,
            shipping_method: request.shipping_method,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            items: snapshot
                .lines
                .iter()
                .map(|line| NewOrderItem {
                    product_id: line.product.id,
                    quantity: line.quantity,
                    price_at_time: line.product.price,
                })
                .collect(),
        };

        let created = self.store.create_order(order).await.map_err(|e| {
            tracing::error!(error = %e, "Order creation failed");
            e
        })?;

        if let Err(e) = self.settle(&snapshot).await {
            tracing::error!(
                order_id = %created.id,
                user_id = %user_id,
                error = %e,
                "Order placed but stock update or cart clear failed"
            );
            return Err(e);
        }

        tracing::info!(
            order_id = %created.id,
            user_id = %user_id,
            total = %created.total_amount,
            items = created.items.len(),
            "Order placed"
        );
        let order_id = created.id.to_string();
        add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
        Ok(created)
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` if nobody is signed in.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Order>, CheckoutError> {
        let user_id = self.require_user()?;
        Ok(self
            .store
            .orders(user_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT), offset)
            .await?)
    }

    /// One of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order isn't the user's.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: OrderId) -> Result<Order, CheckoutError> {
        let user_id = self.require_user()?;
        self.store
            .order(user_id, id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(id))
    }

    /// Shipping and billing addresses for the order. The profile is only
    /// read when the request leaves one of them out.
    async fn resolve_addresses(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<(Address, Address), CheckoutError> {
        if let (Some(shipping), Some(billing)) = (&request.shipping_address, &request.billing_address)
        {
            return Ok((shipping.clone(), billing.clone()));
        }

        let profile = self.store.profile(user_id).await?;
        let (saved_shipping, saved_billing) = profile
            .map(|p| (p.shipping_address, p.billing_address))
            .unwrap_or_default();

        let shipping = request
            .shipping_address
            .clone()
            .or(saved_shipping)
            .ok_or(CheckoutError::AddressRequired)?;
        let billing = request
            .billing_address
            .clone()
            .or(saved_billing)
            .unwrap_or_else(|| shipping.clone());
        Ok((shipping, billing))
    }

    /// Decrement stock for every line, then empty the cart.
    async fn settle(&self, snapshot: &CartSnapshot) -> Result<(), CheckoutError> {
        for line in &snapshot.lines {
            let remaining = line.product.stock_quantity - line.quantity;
            self.store
                .set_product_stock(line.product.id, remaining)
                .await?;
        }
        self.cart.clear().await?;
        Ok(())
    }

    fn require_user(&self) -> Result<UserId, CartError> {
        self.session
            .current_user()
            .ok_or(CartError::NotAuthenticated)
    }
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use lumiere_core::ProductId;

    use super::*;
    use crate::models::{AuthSession, AuthUser, NewProfile, Preferences, Product, ProfileUpdate};
    use crate::store::MemoryStore;

    fn address() -> Address {
        Address {
            street: "5 Avenue Montaigne".to_string(),
            city: "Paris".to_string(),
            state: "IDF".to_string(),
            postal_code: "75008".to_string(),
            country: "FR".to_string(),
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            shipping_method: "standard".to_string(),
            shipping_address: Some(address()),
            billing_address: None,
            notes: Some("Gift wrap, please".to_string()),
        }
    }

    async fn setup(stock: i32) -> (Checkout, CartStore, MemoryStore, Product) {
        let store = MemoryStore::new();
        let cream = Product {
            id: ProductId::generate(),
            name: "Night Cream".to_string(),
            description: None,
            price: Decimal::new(12_000, 2),
            category: Some("skincare".to_string()),
            image_url: None,
            featured: true,
            stock_quantity: stock,
            created_at: None,
        };
        store.insert_product(cream.clone()).await;

        let session = Session::new();
        session.set(AuthSession {
            user: AuthUser {
                id: UserId::generate(),
                email: None,
            },
            access_token: SecretString::from("access"),
            refresh_token: SecretString::from("refresh"),
            expires_at: None,
        });

        let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
        let cart = CartStore::new(Arc::clone(&shared), session.clone());
        let checkout = Checkout::new(shared, session, cart.clone());
        (checkout, cart, store, cream)
    }

    #[tokio::test]
    async fn test_place_order() {
        let (checkout, cart, store, cream) = setup(5).await;
        cart.add(cream.id, 2).await.unwrap();

        let order = checkout.place_order(request()).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Decimal::new(24_000, 2));
        assert_eq!(order.billing_address, address());
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].price_at_time, cream.price);
        assert_eq!(store.stock_of(cream.id).await, Some(3));
        assert!(cart.snapshot().is_empty());

        let history = checkout.history(None, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(checkout.order(order.id).await.unwrap().id, order.id);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let (checkout, _cart, _store, _cream) = setup(5).await;

        let err = checkout.place_order(request()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Cart(CartError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_stock_dropped_since_add() {
        let (checkout, cart, store, cream) = setup(5).await;
        cart.add(cream.id, 4).await.unwrap();
        store.set_product_stock(cream.id, 2).await.unwrap();

        let err = checkout.place_order(request()).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Cart(CartError::InsufficientStock {
                requested: 4,
                available: 2,
                ..
            })
        ));
        assert_eq!(cart.total_items(), 4);
        assert!(checkout.history(None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_address_checked_first() {
        let (checkout, cart, _store, cream) = setup(5).await;
        cart.add(cream.id, 1).await.unwrap();
        let mut req = request();
        if let Some(shipping) = req.shipping_address.as_mut() {
            shipping.city = String::new();
        }

        let err = checkout.place_order(req).await.unwrap_err();

        assert!(matches!(err, CheckoutError::IncompleteAddress("city")));
        assert_eq!(err.to_string(), "address is missing city");
        assert_eq!(cart.total_items(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let (checkout, _cart, _store, _cream) = setup(5).await;
        let id = OrderId::generate();

        assert!(matches!(
            checkout.order(id).await,
            Err(CheckoutError::OrderNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_addresses_fall_back_to_profile() {
        let (checkout, cart, store, cream) = setup(5).await;
        let user_id = checkout.session.current_user().unwrap();
        let mut billing = address();
        billing.street = "1 Place Vendôme".to_string();
        store
            .insert_profile(NewProfile {
                id: user_id,
                email: None,
                preferences: Preferences::default(),
            })
            .await
            .unwrap();
        store
            .update_profile(
                user_id,
                &ProfileUpdate {
                    shipping_address: Some(address()),
                    billing_address: Some(billing.clone()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        cart.add(cream.id, 1).await.unwrap();

        let order = checkout
            .place_order(CheckoutRequest {
                shipping_method: "express".to_string(),
                ..CheckoutRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(order.shipping_address, address());
        assert_eq!(order.billing_address, billing);
    }

    #[tokio::test]
    async fn test_no_shipping_address_anywhere() {
        let (checkout, cart, _store, cream) = setup(5).await;
        cart.add(cream.id, 1).await.unwrap();

        let err = checkout
            .place_order(CheckoutRequest {
                shipping_method: "standard".to_string(),
                ..CheckoutRequest::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::AddressRequired));
        assert_eq!(cart.total_items(), 1);
    }

    #[tokio::test]
    async fn test_stock_update_failure_after_order_created() {
        let (checkout, cart, store, cream) = setup(5).await;
        cart.add(cream.id, 2).await.unwrap();
        let mut req = request();
        req.billing_address = Some(address());

        // Cart reload and order insert succeed, the stock write fails
        store.fail_after(2, 1);
        let err = checkout.place_order(req).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Cart(CartError::RemoteStore(StoreError::Unavailable(_)))
        ));
        assert_eq!(checkout.history(None, 0).await.unwrap().len(), 1);
        assert_eq!(store.stock_of(cream.id).await, Some(5));
        assert_eq!(cart.total_items(), 2);
    }
}
