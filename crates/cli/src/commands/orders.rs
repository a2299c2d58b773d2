//! Checkout and order history commands.

use lumiere_core::{OrderId, Price};
use lumiere_storefront::error::Result;
use lumiere_storefront::models::Order;
use lumiere_storefront::services::checkout::CheckoutRequest;
use lumiere_storefront::state::AppState;

/// Place an order for the cart.
pub async fn checkout(state: &AppState, request: CheckoutRequest) -> Result<()> {
    let order = state.checkout().place_order(request).await?;
    println!("Thank you! Order {} placed.", order.id);
    print_order(&order);
    Ok(())
}

/// List past orders.
pub async fn list(state: &AppState, limit: Option<usize>, offset: usize) -> Result<()> {
    let orders = state.checkout().history(limit, offset).await?;
    if orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for order in &orders {
        println!(
            "  {}  {}  {:<10} {:>10}  {} item(s)",
            order.id,
            order.created_at.format("%Y-%m-%d"),
            order.status.to_string(),
            Price::from_amount(order.total_amount).to_string(),
            order.items.iter().map(|item| item.quantity).sum::<i32>()
        );
    }
    Ok(())
}

/// Show one order.
pub async fn show(state: &AppState, id: OrderId) -> Result<()> {
    let order = state.checkout().order(id).await?;
    println!("Order {}", order.id);
    print_order(&order);
    Ok(())
}

fn print_order(order: &Order) {
    println!("  Status:   {}", order.status);
    println!("  Placed:   {}", order.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Shipping: {}", order.shipping_method);
    let address = &order.shipping_address;
    println!(
        "  Ship to:  {}, {}, {} {}, {}",
        address.street, address.city, address.state, address.postal_code, address.country
    );
    if let Some(tracking) = &order.tracking_number {
        println!("  Tracking: {tracking}");
    }
    for item in &order.items {
        println!(
            "    {} x {}  @ {}",
            item.quantity,
            item.product_id,
            Price::from_amount(item.price_at_time)
        );
    }
    println!("  Total:    {}", Price::from_amount(order.total_amount));
}
