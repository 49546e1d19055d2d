//! Business logic services for the storefront.
//!
//! Services borrow a `&mut PgConnection` (usually an open transaction) and
//! compose repositories; routes and assistant tools share them so both paths
//! enforce the same rules.
//!
//! # Services
//!
//! - `auth` - Registration, login, email verification, password reset
//! - `cart` - Saved and guest carts
//! - `checkout` - Order placement, cancellation, admin status changes
//! - `email` - Transactional email (verification, reset, order confirmation)
//! - `payments` - Payment gateway trait, offline gateway, audit log
//! - `pricing` - Sale prices, shipping quotes, order totals
//! - `returns` - Return requests and the RMA workflow
//! - `reviews` - Reviews and rating aggregates
//! - `sales` - Sale CRUD and holiday automation

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod email;
pub mod payments;
pub mod pricing;
pub mod returns;
pub mod reviews;
pub mod sales;

pub use auth::{AuthError, AuthService};
pub use cart::{AddToCart, CartError, CartOwner, CartService};
pub use checkout::{Buyer, CheckoutError, CheckoutRequest, CheckoutService, OrderAccess};
pub use email::{EmailError, EmailService};
pub use payments::{OfflineGateway, PaymentError, PaymentGateway, PaymentService};
pub use returns::{ReturnError, ReturnService};
pub use reviews::{ReviewError, ReviewService};
pub use sales::{SaleError, SaleService};
