//! Domain models for the storefront.
//!
//! Row types mirror the backend tables (`products`, `cart_items`, `orders`,
//! `order_items`, `profiles`) and deserialize straight from the REST API.

pub mod cart;
pub mod order;
pub mod product;
pub mod profile;
pub mod session;

pub use cart::{CartItem, CartLine, CartSnapshot};
pub use order::{Address, NewOrder, NewOrderItem, Order, OrderItem};
pub use product::{Product, ProductQuery};
pub use profile::{NewProfile, Preferences, Profile, ProfileUpdate};
pub use session::{AuthSession, AuthUser};
