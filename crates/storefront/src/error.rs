//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses carry a JSON body `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::assistant::tools::{ToolCallError, rejection};
use crate::assistant::ChatError;
use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::{
    CartError, CheckoutError, EmailError, PaymentError, ReturnError, ReviewError, SaleError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A tool call was rejected before it ran.
    #[error("Tool call rejected: {0}")]
    ToolCall(#[from] ToolCallError),

    /// An upstream API (Claude, embeddings, SMTP) failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Well-formed request that breaks a business rule.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) | AuthError::InvalidToken => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::ToolCall(err) => match err {
                ToolCallError::UnknownTool(_) => StatusCode::NOT_FOUND,
                ToolCallError::LoginRequired(_) => StatusCode::UNAUTHORIZED,
                ToolCallError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                ToolCallError::InvalidArguments { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Upstream(_) => "External service error".to_owned(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_owned(),
                AuthError::UserNotFound => "User not found".to_owned(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                AuthError::InvalidToken => "Invalid or expired link".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_owned()
                }
            },
            Self::ToolCall(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::Unprocessable(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = match &self {
            Self::ToolCall(err) => {
                let mut body = rejection(err);
                if let Some(object) = body.as_object_mut() {
                    object.insert("error".to_owned(), json!(self.public_message()));
                    object.insert("code".to_owned(), json!(err.code()));
                }
                body
            }
            _ => json!({ "error": self.public_message() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.into())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {e}"))
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Repository(e) => e.into(),
            CartError::ProductNotFound(_) | CartError::ItemNotFound => Self::NotFound(e.to_string()),
            CartError::InvalidQuantity | CartError::InvalidVariant(_) => {
                Self::BadRequest(e.to_string())
            }
            CartError::InsufficientStock { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Repository(e) => e.into(),
            CheckoutError::OrderNotFound => Self::NotFound(e.to_string()),
            CheckoutError::EmptyCart
            | CheckoutError::InvalidAddress(_)
            | CheckoutError::GuestEmailRequired => Self::BadRequest(e.to_string()),
            CheckoutError::ProductUnavailable(_) | CheckoutError::InsufficientStock { .. } => {
                Self::Conflict(e.to_string())
            }
            CheckoutError::NotCancellable(_) | CheckoutError::InvalidTransition { .. } => {
                Self::Unprocessable(e.to_string())
            }
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Repository(e) => e.into(),
            PaymentError::OrderNotFound => Self::NotFound(e.to_string()),
            PaymentError::AlreadyPaid | PaymentError::OrderCancelled => {
                Self::Conflict(e.to_string())
            }
            PaymentError::Declined(_) => Self::Unprocessable(e.to_string()),
            PaymentError::Gateway(_) => Self::Upstream(e.to_string()),
        }
    }
}

impl From<ReturnError> for AppError {
    fn from(e: ReturnError) -> Self {
        match e {
            ReturnError::Repository(e) => e.into(),
            ReturnError::Payment(e) => e.into(),
            ReturnError::OrderNotFound | ReturnError::NotFound | ReturnError::ItemNotFound => {
                Self::NotFound(e.to_string())
            }
            ReturnError::AlreadyRequested => Self::Conflict(e.to_string()),
            ReturnError::InvalidRequest(_) => Self::BadRequest(e.to_string()),
            ReturnError::NotEligible(_) | ReturnError::InvalidTransition { .. } => {
                Self::Unprocessable(e.to_string())
            }
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::Repository(e) => e.into(),
            ReviewError::Invalid(_) => Self::BadRequest(e.to_string()),
            ReviewError::ProductNotFound(_) | ReviewError::NotFound => Self::NotFound(e.to_string()),
            ReviewError::AlreadyReviewed => Self::Conflict(e.to_string()),
        }
    }
}

impl From<SaleError> for AppError {
    fn from(e: SaleError) -> Self {
        match e {
            SaleError::Repository(e) => e.into(),
            SaleError::Invalid(_) => Self::BadRequest(e.to_string()),
            SaleError::NotFound => Self::NotFound(e.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Database(e) => e.into(),
            ChatError::Claude(e) => Self::Upstream(e.to_string()),
            ChatError::SessionNotFound => Self::NotFound(e.to_string()),
            ChatError::InvalidMessage(msg) => Self::BadRequest(msg),
            ChatError::TooManyToolIterations => Self::Internal(e.to_string()),
        }
    }
}

impl From<EmailError> for AppError {
    fn from(e: EmailError) -> Self {
        Self::Upstream(e.to_string())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use insightshop_core::{OrderStatus, ProductId};

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_owned());
        assert_eq!(err.to_string(), "Not found: product-123");
        assert_eq!(err.public_message(), "product-123");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(get_status(AppError::Upstream("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_service_errors_map_to_statuses() {
        assert_eq!(get_status(CartError::ProductNotFound(ProductId::new(1))), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(CartError::InsufficientStock { name: "Tee".into(), available: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(CheckoutError::NotCancellable(OrderStatus::Shipped)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(get_status(PaymentError::AlreadyPaid), StatusCode::CONFLICT);
        assert_eq!(get_status(ReviewError::AlreadyReviewed), StatusCode::CONFLICT);
        assert_eq!(get_status(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(get_status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(ToolCallError::PermissionDenied("product_create".into())),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json_and_hides_internals() {
        let response = AppError::Internal("connection reset by peer".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }
}
