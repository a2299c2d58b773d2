//! REST row shapes and conversions to domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lumiere_core::{CartItemId, OrderId, ProductId, UserId};

use crate::models::{CartLine, NewOrderItem, Product, ProfileUpdate};

/// Columns selected for every product read.
pub(super) const PRODUCT_COLUMNS: &str =
    "id,name,description,price,category,image_url,featured,stock_quantity,created_at";

/// Columns selected for plain cart rows.
pub(super) const CART_ITEM_COLUMNS: &str = "id,user_id,product_id,quantity,created_at";

/// Cart rows with the product embedded through the `product_id` foreign key.
pub(super) fn cart_line_select() -> String {
    format!("id,quantity,created_at,product:products({PRODUCT_COLUMNS})")
}

/// Orders with their items embedded.
pub(super) const ORDER_SELECT: &str =
    "*,items:order_items(id,order_id,product_id,quantity,price_at_time)";

/// Error body returned by the REST API.
#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

/// A cart row with its embedded product. The product is `None` if the
/// product row is hidden from (or was deleted for) the caller.
#[derive(Debug, Deserialize)]
pub(super) struct CartLineRow {
    pub id: CartItemId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub product: Option<Product>,
}

/// Insert payload for `cart_items`.
#[derive(Debug, Serialize)]
pub(super) struct CartItemInsert {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Patch payload for `cart_items`.
#[derive(Debug, Serialize)]
pub(super) struct QuantityPatch {
    pub quantity: i32,
}

/// Patch payload for `products`.
#[derive(Debug, Serialize)]
pub(super) struct StockPatch {
    pub stock_quantity: i32,
    pub updated_at: DateTime<Utc>,
}

/// Patch payload for `profiles`.
#[derive(Debug, Serialize)]
pub(super) struct ProfilePatch<'a> {
    #[serde(flatten)]
    pub update: &'a ProfileUpdate,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for `order_items`.
#[derive(Debug, Serialize)]
pub(super) struct OrderItemInsert {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_time: Decimal,
}

impl OrderItemInsert {
    pub(super) const fn new(order_id: OrderId, item: &NewOrderItem) -> Self {
        Self {
            order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            price_at_time: item.price_at_time,
        }
    }
}

/// Convert joined rows to cart lines, dropping rows without a product.
pub(super) fn convert_cart_lines(rows: Vec<CartLineRow>) -> Vec<CartLine> {
    rows.into_iter()
        .filter_map(|row| {
            let Some(product) = row.product else {
                tracing::warn!(cart_item_id = %row.id, "Cart row without readable product skipped");
                return None;
            };
            Some(CartLine {
                id: row.id,
                product,
                quantity: row.quantity,
                created_at: row.created_at,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_line_select_embeds_products() {
        assert_eq!(
            cart_line_select(),
            "id,quantity,created_at,product:products(id,name,description,price,category,image_url,featured,stock_quantity,created_at)"
        );
    }

    #[test]
    fn test_convert_cart_lines_skips_missing_products() {
        let rows: Vec<CartLineRow> = serde_json::from_value(serde_json::json!([
            {
                "id": "9c5b94b1-35ad-49bb-b118-8e8fc24abf80",
                "quantity": 2,
                "created_at": "2025-06-01T12:00:00+00:00",
                "product": {
                    "id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
                    "name": "Silk Foundation",
                    "price": 64,
                    "stock_quantity": 12
                }
            },
            {
                "id": "0f8fad5b-d9cb-469f-a165-70867728950e",
                "quantity": 1,
                "created_at": "2025-06-01T11:00:00+00:00",
                "product": null
            }
        ]))
        .unwrap();

        let lines = convert_cart_lines(rows);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.name, "Silk Foundation");
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn test_profile_patch_flattens_update() {
        let update = ProfileUpdate {
            full_name: Some("Camille Laurent".to_string()),
            ..ProfileUpdate::default()
        };
        let patch = ProfilePatch {
            update: &update,
            updated_at: "2025-06-01T12:00:00Z".parse().unwrap(),
        };

        let value = serde_json::to_value(&patch).unwrap();

        assert_eq!(value["full_name"], "Camille Laurent");
        assert!(value.get("phone").is_none());
        assert!(value.get("updated_at").is_some());
    }

    #[test]
    fn test_api_error_body_parses_partial() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"code":"23505","message":"duplicate key"}"#).unwrap();
        assert_eq!(body.code.as_deref(), Some("23505"));
        assert!(body.details.is_none());
        assert!(body.hint.is_none());
    }
}
