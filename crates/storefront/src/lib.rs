//! InsightShop storefront library.
//!
//! The binary in `main.rs` only wires these modules into a server; the CLI
//! and integration tests use them directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assistant;
pub mod claude;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
