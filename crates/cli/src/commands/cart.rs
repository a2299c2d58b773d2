//! Cart commands.

use lumiere_core::{CartItemId, ProductId};
use lumiere_storefront::error::Result;
use lumiere_storefront::models::CartSnapshot;
use lumiere_storefront::state::AppState;

/// Show the cart.
pub async fn show(state: &AppState) -> Result<()> {
    state.cart().reload().await?;
    print_cart(&state.cart().snapshot());
    Ok(())
}

/// Add a product to the cart.
pub async fn add(state: &AppState, product_id: ProductId, quantity: i32) -> Result<()> {
    state.cart().add(product_id, quantity).await?;
    print_cart(&state.cart().snapshot());
    Ok(())
}

/// Set the quantity of a cart item.
pub async fn update(state: &AppState, item_id: CartItemId, quantity: i32) -> Result<()> {
    state.cart().update(item_id, quantity).await?;
    print_cart(&state.cart().snapshot());
    Ok(())
}

/// Remove a cart item.
pub async fn remove(state: &AppState, item_id: CartItemId) -> Result<()> {
    state.cart().remove(item_id).await?;
    print_cart(&state.cart().snapshot());
    Ok(())
}

/// Empty the cart.
pub async fn clear(state: &AppState) -> Result<()> {
    state.cart().clear().await?;
    println!("Cart cleared.");
    Ok(())
}

fn print_cart(cart: &CartSnapshot) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for line in &cart.lines {
        println!(
            "  {}  {:<32} {:>3} x {:>10} = {:>10}",
            line.id,
            line.product.name,
            line.quantity,
            line.product.unit_price().to_string(),
            line.line_total().to_string()
        );
    }
    println!(
        "{} item(s), total {}",
        cart.total_items(),
        cart.total_price()
    );
}
