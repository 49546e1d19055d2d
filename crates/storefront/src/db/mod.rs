//! Database operations for the storefront `PostgreSQL` database.
//!
//! # Schema: `insightshop`
//!
//! ## Tables
//!
//! - `user` - Shopper and admin accounts
//! - `product` / `product_relation` / `product_embedding` - Catalog, "goes well with"
//!   edges, and the vector index
//! - `cart_item` - Authenticated cart lines (guest carts live in the session)
//! - `order` / `order_item` / `shipment` - Orders with price-at-purchase snapshots
//! - `payment` / `payment_log` - Payment records and the audit trail of attempts
//! - `sale` - Date-ranged discounts with a JSON product predicate
//! - `review` - One review per user per product
//! - `return_request` - RMA records
//! - `chat_session` / `chat_message` - Assistant conversation history
//!
//! # Connections
//!
//! Repositories borrow a `&mut PgConnection` so the same code runs against a
//! pooled connection or inside a transaction (`&mut tx` derefs to a connection).
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p insightshop-cli -- migrate
//! ```

pub mod cart;
pub mod chat;
pub mod embeddings;
pub mod orders;
pub mod payments;
pub mod products;
pub mod relations;
pub mod returns;
pub mod reviews;
pub mod sales;
pub mod shipments;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use chat::ChatRepository;
pub use embeddings::{EmbeddingRepository, SimilarProduct, format_embedding};
pub use orders::{OrderDraft, OrderRepository};
pub use payments::PaymentRepository;
pub use products::ProductRepository;
pub use relations::RelationRepository;
pub use returns::ReturnRepository;
pub use reviews::ReviewRepository;
pub use sales::SaleRepository;
pub use shipments::{Shipment, ShipmentRepository};
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_unique_violation(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
