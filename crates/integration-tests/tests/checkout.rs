//! Integration tests for checkout.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;

use lumiere_core::OrderStatus;
use lumiere_integration_tests::{TestContext, address};
use lumiere_storefront::services::cart::CartError;
use lumiere_storefront::models::ProfileUpdate;
use lumiere_storefront::services::checkout::{CheckoutError, CheckoutRequest};

fn request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_method: "express".to_string(),
        shipping_address: Some(address()),
        billing_address: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_checkout_places_order_and_empties_cart() {
    let ctx = TestContext::new();
    let user = ctx.sign_in_new_user();
    let serum = ctx.product("Rose Serum", 8_500, 10).await;
    let balm = ctx.product("Lip Balm", 1_800, 4).await;
    let cart = ctx.state.cart();
    cart.add(serum.id, 2).await.unwrap();
    cart.add(balm.id, 3).await.unwrap();

    let order = ctx.state.checkout().place_order(request()).await.unwrap();

    assert_eq!(order.user_id, user);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Decimal::new(22_400, 2));
    assert_eq!(order.items.len(), 2);
    assert_eq!(ctx.store.stock_of(serum.id).await, Some(8));
    assert_eq!(ctx.store.stock_of(balm.id).await, Some(1));
    assert!(cart.snapshot().is_empty());
    assert!(ctx.store.cart_rows(user).await.is_empty());
}

#[tokio::test]
async fn test_order_prices_are_fixed_at_checkout() {
    let ctx = TestContext::new();
    ctx.sign_in_new_user();
    let mut serum = ctx.product("Rose Serum", 8_500, 10).await;
    ctx.state.cart().add(serum.id, 1).await.unwrap();
    let order = ctx.state.checkout().place_order(request()).await.unwrap();

    serum.price = Decimal::new(9_900, 2);
    ctx.store.insert_product(serum).await;

    let stored = ctx.state.checkout().order(order.id).await.unwrap();
    assert_eq!(stored.items[0].price_at_time, Decimal::new(8_500, 2));
}

#[tokio::test]
async fn test_history_is_newest_first_and_paged() {
    let ctx = TestContext::new();
    ctx.sign_in_new_user();
    let serum = ctx.product("Rose Serum", 8_500, 10).await;

    let mut placed = Vec::new();
    for _ in 0..3 {
        ctx.state.cart().add(serum.id, 1).await.unwrap();
        placed.push(ctx.state.checkout().place_order(request()).await.unwrap().id);
    }

    let history = ctx.state.checkout().history(None, 0).await.unwrap();
    let ids: Vec<_> = history.iter().map(|order| order.id).collect();
    assert_eq!(ids, [placed[2], placed[1], placed[0]]);

    let page = ctx.state.checkout().history(Some(1), 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, placed[1]);
}

#[tokio::test]
async fn test_orders_are_private() {
    let ctx = TestContext::new();
    ctx.sign_in_new_user();
    let serum = ctx.product("Rose Serum", 8_500, 10).await;
    ctx.state.cart().add(serum.id, 1).await.unwrap();
    let order = ctx.state.checkout().place_order(request()).await.unwrap();

    ctx.sign_in_new_user();

    assert!(ctx.state.checkout().history(None, 0).await.unwrap().is_empty());
    assert!(matches!(
        ctx.state.checkout().order(order.id).await,
        Err(CheckoutError::OrderNotFound(_))
    ));
}

#[tokio::test]
async fn test_checkout_requires_sign_in() {
    let ctx = TestContext::new();

    let err = ctx.state.checkout().place_order(request()).await.unwrap_err();

    assert!(matches!(err, CheckoutError::Cart(CartError::NotAuthenticated)));
}

#[tokio::test]
async fn test_failed_checkout_keeps_cart() {
    let ctx = TestContext::new();
    let user = ctx.sign_in_new_user();
    let serum = ctx.product("Rose Serum", 8_500, 10).await;
    ctx.state.cart().add(serum.id, 2).await.unwrap();

    ctx.store.fail_next(1);
    let err = ctx.state.checkout().place_order(request()).await.unwrap_err();

    assert!(matches!(err, CheckoutError::Cart(CartError::RemoteStore(_))));
    assert_eq!(ctx.state.cart().total_items(), 2);

    assert_eq!(ctx.store.cart_rows(user).await.len(), 1);
    assert_eq!(ctx.store.stock_of(serum.id).await, Some(10));
    assert!(ctx.state.checkout().history(None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_uses_saved_profile_addresses() {
    let ctx = TestContext::new();
    ctx.sign_in_new_user();
    let serum = ctx.product("Rose Serum", 8_500, 10).await;
    ctx.state
        .profiles()
        .update(ProfileUpdate {
            full_name: Some("Camille Laurent".to_string()),
            shipping_address: Some(address()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap();
    ctx.state.cart().add(serum.id, 1).await.unwrap();

    let order = ctx
        .state
        .checkout()
        .place_order(CheckoutRequest {
            shipping_method: "standard".to_string(),
            ..CheckoutRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(order.shipping_address, address());
    assert_eq!(order.billing_address, address());
}

#[tokio::test]
async fn test_checkout_without_any_address() {
    let ctx = TestContext::new();
    ctx.sign_in_new_user();
    let serum = ctx.product("Rose Serum", 8_500, 10).await;
    ctx.state.cart().add(serum.id, 1).await.unwrap();

    let err = ctx
        .state
        .checkout()
        .place_order(CheckoutRequest {
            shipping_method: "standard".to_string(),
            ..CheckoutRequest::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::AddressRequired));
    assert_eq!(ctx.state.cart().total_items(), 1);
}
