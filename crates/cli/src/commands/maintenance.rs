//! Scheduled maintenance: sale automation and the product vector index.
//!
//! Both are also reachable over HTTP (`POST /api/sales/automation/run`,
//! `POST /api/admin/index/rebuild`); these commands are for cron.

use chrono::Utc;
use insightshop_storefront::config::EmbeddingConfig;
use insightshop_storefront::embeddings::{EmbeddingClient, ProductIndexer};
use insightshop_storefront::services::SaleService;

use super::CommandError;

/// Create upcoming holiday sales and sync every sale's active flag.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a query fails.
pub async fn run_sales() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let mut tx = pool.begin().await.map_err(CommandError::from)?;

    let report = SaleService::new(&mut tx)
        .run_automation(Utc::now().date_naive())
        .await?;
    tx.commit().await.map_err(CommandError::from)?;

    tracing::info!(
        created = ?report.created,
        activated = ?report.activated,
        deactivated = ?report.deactivated,
        "Sale automation complete"
    );
    Ok(())
}

/// Re-embed products whose text changed since the last run.
///
/// # Errors
///
/// Returns an error if `OPENAI_API_KEY` is not set, or the embedding API or
/// database fails.
pub async fn index_products() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let config = EmbeddingConfig::from_env().ok_or("OPENAI_API_KEY not set")?;
    let client = EmbeddingClient::new(&config)?;

    let report = ProductIndexer::new(pool, client).rebuild().await?;
    tracing::info!(
        embedded = report.embedded,
        unchanged = report.unchanged,
        pruned = report.pruned,
        "Product index rebuilt"
    );
    Ok(())
}
