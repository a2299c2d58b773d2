//! Lumière Storefront library.
//!
//! Catalog, cart, checkout and authentication services for the Lumière
//! storefront, backed by a hosted Postgres REST API. Front ends (the
//! `lumiere` CLI, tests) build an [`state::AppState`] and drive the services
//! through it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
