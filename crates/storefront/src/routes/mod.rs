//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST /api/auth/register                 - Create account, log in
//! POST /api/auth/login                    - Log in, merge guest cart
//! POST /api/auth/logout                   - Log out
//! GET  /api/auth/me                       - Current user
//! POST /api/auth/verify-email             - Consume verification token
//! POST /api/auth/password-reset           - Mail a reset link
//! POST /api/auth/password-reset/confirm   - Set a new password
//!
//! # Catalog
//! GET  /api/products                      - Filtered listing
//! GET  /api/products/{id}                 - Product detail
//! GET  /api/products/{id}/matches         - Outfit suggestions
//! GET  /api/products/{id}/reviews         - Reviews
//! POST /api/products/{id}/reviews         - Write a review (auth)
//! PUT  /api/reviews/{id}                  - Edit own review (auth)
//! DELETE /api/reviews/{id}                - Delete own review (auth)
//! GET  /api/sales                         - Active sales
//! POST /api/sales/automation/run          - Holiday automation (cron token or admin)
//!
//! # Cart (saved or guest)
//! GET    /api/cart                        - Cart view
//! POST   /api/cart                        - Add item
//! PUT    /api/cart/{line}                 - Set quantity (0 removes)
//! DELETE /api/cart/{line}                 - Remove line
//! DELETE /api/cart                        - Clear
//!
//! # Orders, payments, returns, shipping
//! POST /api/orders                        - Checkout
//! GET  /api/orders                        - Order history (auth)
//! GET  /api/orders/{id}                   - Order detail
//! POST /api/orders/{id}/cancel            - Cancel
//! POST /api/payments                      - Pay for an order
//! GET  /api/returns                       - Own return requests (auth)
//! POST /api/returns                       - Request a return (auth)
//! GET  /api/returns/eligibility/{order}   - Return window check (auth)
//! GET  /api/shipping/rates?subtotal=      - Shipping quotes
//! GET  /api/shipping/track/{number}       - Shipment tracking
//!
//! # Members
//! GET  /api/members/me                    - Profile (auth)
//! PUT  /api/members/me                    - Update profile (auth)
//!
//! # Assistant
//! POST /api/ai/chat                       - Chat turn
//! GET  /api/ai/sessions                   - Own conversations (auth)
//! GET  /api/ai/sessions/{id}/messages     - Conversation history
//! GET  /api/ai/tools                      - Tools the caller may use
//! POST /api/ai/tools/execute              - Run a tool directly
//!
//! # Admin (admin session)
//! /api/admin/products, /api/admin/orders, /api/admin/returns,
//! /api/admin/sales, /api/admin/users, /api/admin/index/rebuild
//! ```

pub mod admin;
pub mod ai;
pub mod auth;
pub mod cart;
pub mod members;
pub mod orders;
pub mod payments;
pub mod products;
pub mod returns;
pub mod reviews;
pub mod sales;
pub mod shipping;

use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::middleware::{api_rate_limiter, auth_rate_limiter, chat_rate_limiter};
use crate::state::AppState;

/// Query-string paging.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    const DEFAULT_LIMIT: i64 = 20;
    const MAX_LIMIT: i64 = 100;

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Today's date for sale and pricing decisions.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(products::router())
        .merge(reviews::router())
        .merge(sales::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(returns::router())
        .merge(shipping::router())
        .merge(members::router())
        .merge(admin::router())
        .layer(api_rate_limiter());

    Router::new()
        .merge(api)
        .merge(auth::router().layer(auth_rate_limiter()))
        .merge(ai::router().layer(chat_rate_limiter()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let page = Pagination {
            limit: Some(1000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 0);
        assert_eq!(Pagination::default().limit(), 20);
    }
}
