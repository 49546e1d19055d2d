//! InsightShop Core - Shared types library.
//!
//! This crate provides common types used across all InsightShop components:
//! - `storefront` - JSON API server, AI shopping assistant, and tool registry
//! - `cli` - Command-line tools for migrations, sale automation, and indexing
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
