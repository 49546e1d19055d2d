//! CLI command implementations.

pub mod admin;
pub mod maintenance;
pub mod migrate;

use insightshop_storefront::config::{ConfigError, database_url_from_env};
use insightshop_storefront::db::create_pool;
use sqlx::PgPool;

/// Connect using `INSIGHTSHOP_DATABASE_URL` (or `DATABASE_URL`).
async fn connect() -> Result<PgPool, CommandError> {
    let database_url = database_url_from_env()?;
    tracing::info!("Connecting to database...");
    Ok(create_pool(&database_url).await?)
}

/// Errors shared by all commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
