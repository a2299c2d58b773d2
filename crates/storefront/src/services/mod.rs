//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `session` - Who is signed in, with change notifications
//! - `auth` - Password sign-in against the hosted auth provider
//! - `catalog` - Product lookups and listings
//! - `cart` - Cart synchronized with the record store
//! - `checkout` - Order placement and history
//! - `profile` - Customer name, saved addresses and preferences

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod profile;
pub mod session;
