//! Catalog commands.

use lumiere_core::ProductId;
use lumiere_storefront::error::Result;
use lumiere_storefront::models::Product;
use lumiere_storefront::state::AppState;

/// List featured products.
pub async fn featured(state: &AppState) -> Result<()> {
    let products = state.catalog().featured().await?;
    print_list("Featured", &products);
    Ok(())
}

/// List products of a category.
pub async fn category(state: &AppState, name: &str) -> Result<()> {
    let products = state.catalog().by_category(name).await?;
    print_list(name, &products);
    Ok(())
}

/// Show one product.
pub async fn show(state: &AppState, id: ProductId) -> Result<()> {
    let product = state.catalog().product(id).await?;

    println!("{}", product.name);
    println!("  {}", product.unit_price());
    if let Some(category) = &product.category {
        println!("  Category: {category}");
    }
    println!("  {}", stock_label(&product));
    if let Some(description) = &product.description {
        println!();
        println!("{description}");
    }
    println!();
    println!("ID: {}", product.id);
    Ok(())
}

fn print_list(title: &str, products: &[Product]) {
    if products.is_empty() {
        println!("No products found.");
        return;
    }

    println!("{title} ({})", products.len());
    for product in products {
        println!(
            "  {}  {:<32} {:>10}  {}",
            product.id,
            product.name,
            product.unit_price().to_string(),
            stock_label(product)
        );
    }
}

fn stock_label(product: &Product) -> String {
    match product.stock_quantity {
        n if n <= 0 => "Out of stock".to_string(),
        n if n < 5 => format!("Only {n} left"),
        n => format!("{n} in stock"),
    }
}
