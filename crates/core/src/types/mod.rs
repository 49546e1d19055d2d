//! Core types for InsightShop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod permission;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{apply_discount, round_money};
pub use permission::{CallerRole, ToolPermission};
pub use status::*;
