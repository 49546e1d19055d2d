//! Tools the assistant may call.
//!
//! The catalog in `catalog.json` is the whole surface: a call is checked
//! against it for existence, caller permission, and argument shape before any
//! handler runs, whatever the model proposed.

mod executor;
mod handlers;
pub mod registry;
pub mod schema;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use insightshop_core::{CallerRole, UserId};

use crate::db::RepositoryError;
use crate::services::{CartError, CheckoutError, ReturnError, ReviewError, SaleError};

pub use executor::{ToolExecutor, rejection};
pub use registry::{RegistryError, ToolDefinition, ToolRegistry};
pub use schema::{Schema, SchemaError, SchemaViolation};

/// A tool call rejected before execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("tool `{0}` requires a signed-in user")]
    LoginRequired(String),

    #[error("tool `{0}` requires an administrator")]
    PermissionDenied(String),

    #[error("invalid arguments for `{tool}`: {}", join_violations(violations))]
    InvalidArguments {
        tool: String,
        violations: Vec<SchemaViolation>,
    },
}

impl ToolCallError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::LoginRequired(_) => "login_required",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidArguments { .. } => "invalid_arguments",
        }
    }

    /// Violations for `InvalidArguments`, empty otherwise.
    #[must_use]
    pub fn violations(&self) -> &[SchemaViolation] {
        match self {
            Self::InvalidArguments { violations, .. } => violations,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Who is calling a tool, and when.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext {
    pub caller: CallerRole,
    pub user_id: Option<UserId>,
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

impl ToolContext {
    #[must_use]
    pub fn new(caller: CallerRole, user_id: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            caller,
            user_id,
            today: now.date_naive(),
            now,
        }
    }

    /// Context for an anonymous shopper.
    #[must_use]
    pub fn guest(now: DateTime<Utc>) -> Self {
        Self::new(CallerRole::Guest, None, now)
    }
}

/// A handler failure. Reported to the model as `{"success": false}`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Sale(#[from] SaleError),

    #[error(transparent)]
    Return(#[from] ReturnError),

    #[error("invalid arguments: {0}")]
    Arguments(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("sign in to use this tool")]
    LoginRequired,
}

impl ToolError {
    /// Whether the failure is on our side rather than the request's.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Repository(_)
                | Self::Cart(CartError::Repository(_))
                | Self::Checkout(CheckoutError::Repository(_))
                | Self::Review(ReviewError::Repository(_))
                | Self::Sale(SaleError::Repository(_))
                | Self::Return(ReturnError::Repository(_) | ReturnError::Payment(_))
        )
    }

    /// Message safe to show the model and the shopper.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal error".to_owned()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arguments_message_lists_violations() {
        let err = ToolCallError::InvalidArguments {
            tool: "cart_add_item".to_owned(),
            violations: vec![
                SchemaViolation {
                    path: "/quantity".to_owned(),
                    message: "must be at most 99".to_owned(),
                },
                SchemaViolation {
                    path: String::new(),
                    message: "missing required property `product_id`".to_owned(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid arguments for `cart_add_item`: /quantity: must be at most 99; missing required property `product_id`"
        );
    }

    #[test]
    fn test_call_error_codes() {
        let err = ToolCallError::UnknownTool("drop_tables".to_owned());
        assert_eq!(err.code(), "unknown_tool");
        assert!(err.violations().is_empty());
        assert_eq!(
            ToolCallError::LoginRequired("cart_view".to_owned()).to_string(),
            "tool `cart_view` requires a signed-in user"
        );
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = ToolError::Repository(RepositoryError::DataCorruption("bad row".to_owned()));
        assert_eq!(err.public_message(), "internal error");

        let err = ToolError::Cart(CartError::InvalidQuantity);
        assert_eq!(err.public_message(), "quantity must be between 1 and 99");

        let err = ToolError::NotFound("product 4".to_owned());
        assert_eq!(err.public_message(), "product 4 not found");
    }

    #[test]
    fn test_guest_context() {
        let ctx = ToolContext::guest(Utc::now());
        assert_eq!(ctx.caller, CallerRole::Guest);
        assert!(ctx.user_id.is_none());
    }
}
