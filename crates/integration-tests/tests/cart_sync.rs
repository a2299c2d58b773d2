//! Integration tests for the cart synchronizer.
//!
//! These tests drive `CartStore` through `AppState` against the in-memory
//! record store and check both the local snapshot and the stored rows.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;

use lumiere_core::{CartItemId, UserId};
use lumiere_integration_tests::TestContext;
use lumiere_storefront::services::cart::CartError;
use lumiere_storefront::store::{RecordStore, StoreError};

// =============================================================================
// Mutation Sequence
// =============================================================================

#[tokio::test]
async fn test_add_merge_update_remove() {
    let ctx = TestContext::new();
    let user = ctx.sign_in_new_user();
    let lipstick = ctx.product("Velvet Lipstick", 3_800, 20).await;
    let cart = ctx.state.cart();

    cart.add(lipstick.id, 2).await.unwrap();
    assert_eq!(cart.total_items(), 2);

    cart.add(lipstick.id, 3).await.unwrap();
    let rows = ctx.store.cart_rows(user).await;
    assert_eq!(rows.len(), 1, "one row per (user, product)");
    assert_eq!(rows[0].quantity, 5);
    assert_eq!(cart.total_price().amount, Decimal::new(19_000, 2));

    let item_id = cart.snapshot().lines[0].id;
    cart.update(item_id, 1).await.unwrap();
    assert_eq!(cart.total_items(), 1);
    assert_eq!(ctx.store.cart_rows(user).await[0].quantity, 1);

    cart.remove(item_id).await.unwrap();
    assert!(cart.snapshot().is_empty());
    assert_eq!(cart.total_items(), 0);
    assert_eq!(cart.total_price().amount, Decimal::ZERO);
    assert!(ctx.store.cart_rows(user).await.is_empty());
}

#[tokio::test]
async fn test_lines_are_newest_first() {
    let ctx = TestContext::new();
    ctx.sign_in_new_user();
    let first = ctx.product("Cleansing Balm", 4_600, 5).await;
    let second = ctx.product("Eye Cream", 9_200, 5).await;
    let cart = ctx.state.cart();

    cart.add(first.id, 1).await.unwrap();
    cart.add(second.id, 1).await.unwrap();

    let names: Vec<_> = cart
        .snapshot()
        .lines
        .iter()
        .map(|line| line.product.name.clone())
        .collect();
    assert_eq!(names, ["Eye Cream", "Cleansing Balm"]);
    assert_eq!(cart.total_price().amount, Decimal::new(13_800, 2));
}

/// Drives a seeded random sequence of adds, updates and removes and checks
/// after every step that the snapshot matches the stored rows.
#[tokio::test]
async fn test_random_sequences_keep_totals_consistent() {
    let ctx = TestContext::new();
    let user = ctx.sign_in_new_user();
    let products = [
        ctx.product("Velvet Lipstick", 3_800, 5).await,
        ctx.product("Rose Toner", 3_200, 5).await,
        ctx.product("Clay Mask", 5_500, 5).await,
    ];
    let cart = ctx.state.cart();

    let mut seed: u64 = 0x5EED_CAFE;
    let mut next = |bound: u64| {
        seed = seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (seed >> 33) % bound
    };

    for step in 0..200 {
        let product = &products[usize::try_from(next(3)).unwrap()];
        let quantity = i32::try_from(next(7)).unwrap() - 2;
        let line_id = cart
            .snapshot()
            .lines
            .iter()
            .find(|line| line.product.id == product.id)
            .map(|line| line.id)
            .unwrap_or_else(CartItemId::generate);

        let result = match next(3) {
            0 => cart.add(product.id, quantity).await,
            1 => cart.update(line_id, quantity).await,
            _ => cart.remove(line_id).await,
        };
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    CartError::InvalidQuantity(_)
                        | CartError::InsufficientStock { .. }
                        | CartError::ItemNotFound(_)
                ),
                "step {step}: unexpected error {err}"
            );
        }

        let rows = ctx.store.cart_rows(user).await;
        let stored: i64 = rows.iter().map(|row| i64::from(row.quantity)).sum();
        assert_eq!(cart.total_items(), stored, "step {step}");
        assert!(rows.iter().all(|row| row.quantity >= 1), "step {step}: {rows:?}");
        assert!(
            cart.snapshot().lines.iter().all(|line| line.quantity >= 1),
            "step {step}"
        );
    }
}

// =============================================================================
// Ownership
// =============================================================================

#[tokio::test]
async fn test_users_cannot_touch_each_other_carts() {
    let ctx = TestContext::new();
    let toner = ctx.product("Rose Toner", 3_200, 10).await;

    let alice = ctx.sign_in_new_user();
    ctx.state.cart().add(toner.id, 2).await.unwrap();
    let alice_item = ctx.state.cart().snapshot().lines[0].id;

    let bob = ctx.sign_in_new_user();
    ctx.state.cart().reload().await.unwrap();
    assert!(ctx.state.cart().snapshot().is_empty());

    let err = ctx.state.cart().update(alice_item, 9).await.unwrap_err();
    assert!(matches!(err, CartError::ItemNotFound(_)));

    ctx.state.cart().remove(alice_item).await.unwrap();
    ctx.state.cart().clear().await.unwrap();

    assert_eq!(ctx.store.cart_rows(alice).await[0].quantity, 2);
    assert!(ctx.store.cart_rows(bob).await.is_empty());
}

#[tokio::test]
async fn test_anonymous_mutations_are_rejected() {
    let ctx = TestContext::new();
    let toner = ctx.product("Rose Toner", 3_200, 10).await;

    assert!(matches!(
        ctx.state.cart().add(toner.id, 1).await,
        Err(CartError::NotAuthenticated)
    ));
    assert!(matches!(
        ctx.state.cart().remove(CartItemId::generate()).await,
        Err(CartError::NotAuthenticated)
    ));
}

// =============================================================================
// Stock
// =============================================================================

#[tokio::test]
async fn test_stock_limits() {
    let ctx = TestContext::new();
    let user = ctx.sign_in_new_user();
    let perfume = ctx.product("No. 7 Eau de Parfum", 21_000, 3).await;
    let cart = ctx.state.cart();

    let err = cart.add(perfume.id, 4).await.unwrap_err();
    assert!(matches!(
        err,
        CartError::InsufficientStock {
            requested: 4,
            available: 3,
            ..
        }
    ));
    assert!(ctx.store.cart_rows(user).await.is_empty());

    cart.add(perfume.id, 3).await.unwrap();
    let item_id = cart.snapshot().lines[0].id;
    assert!(matches!(
        cart.update(item_id, 4).await,
        Err(CartError::InsufficientStock { .. })
    ));
    assert_eq!(cart.total_items(), 3);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_write_keeps_snapshot() {
    let ctx = TestContext::new();
    ctx.sign_in_new_user();
    let mask = ctx.product("Clay Mask", 5_500, 10).await;
    let cart = ctx.state.cart();
    cart.add(mask.id, 1).await.unwrap();
    let before = cart.snapshot();

    ctx.store.fail_next(1);
    let err = cart.update(before.lines[0].id, 4).await.unwrap_err();

    assert!(matches!(err, CartError::RemoteStore(StoreError::Unavailable(_))));
    assert_eq!(cart.snapshot(), before);

    // No automatic retry: the next call simply works
    cart.update(before.lines[0].id, 4).await.unwrap();
    assert_eq!(cart.total_items(), 4);
}

#[tokio::test]
async fn test_failed_reload_keeps_old_snapshot() {
    let ctx = TestContext::new();
    let user = ctx.sign_in_new_user();
    let mask = ctx.product("Clay Mask", 5_500, 10).await;
    let cart = ctx.state.cart();
    cart.add(mask.id, 1).await.unwrap();
    let before = cart.snapshot();
    let item_id = before.lines[0].id;

    // Another device changes the row; our reload then fails
    ctx.store
        .update_cart_quantity(user, item_id, 2)
        .await
        .unwrap()
        .unwrap();

    ctx.store.fail_next(1);
    assert!(cart.reload().await.is_err());
    assert_eq!(cart.snapshot(), before);

    cart.reload().await.unwrap();
    assert_eq!(cart.total_items(), 2);
}

#[tokio::test]
async fn test_subscribers_see_each_settled_state() {
    let ctx = TestContext::new();
    ctx.sign_in(UserId::generate());
    let serum = ctx.product("Vitamin C Serum", 7_400, 10).await;
    let cart = ctx.state.cart();
    let mut rx = cart.subscribe();

    cart.add(serum.id, 2).await.unwrap();

    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.total_items(), 2);
}
