//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the `sqlx` row types that
//! live next to each repository.

pub mod cart;
pub mod chat;
pub mod order;
pub mod payment;
pub mod product;
pub mod return_request;
pub mod review;
pub mod sale;
pub mod session;
pub mod user;

pub use cart::{CartItem, CartLine, CartView, GuestCartItem, MAX_LINE_QUANTITY};
pub use chat::{ChatMessage, ChatSession};
pub use order::{Order, OrderItem, OrderWithItems, ShippingAddress, ShippingMethod};
pub use product::{NewProduct, Product, ProductFilter, ProductSort, ProductUpdate};
pub use payment::{Payment, PaymentLogEntry};
pub use return_request::{NewReturn, ReturnEligibility, ReturnRequest};
pub use review::{Review, ReviewInput};
pub use sale::{NewSale, Sale, SaleFilter};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{ProfileUpdate, User};
