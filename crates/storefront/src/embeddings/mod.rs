//! Vector index over the product catalog.
//!
//! Product text is embedded with an OpenAI-compatible API and stored in the
//! `product_embedding` pgvector table. The assistant embeds shopper messages
//! with the same model and ranks products by cosine similarity.
//!
//! - [`EmbeddingClient`] - HTTP client with a TTL cache for query embeddings
//! - [`ProductIndexer`] - Rebuilds embeddings of products whose text changed

mod client;
mod index;

pub use client::{EMBEDDING_DIMENSIONS, EmbeddingClient};
pub use index::{IndexReport, ProductIndexer};

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors from the embedding API or the vector index.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("embedding API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The API answered with an unexpected payload.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Client configuration is unusable.
    #[error("embedding client configuration error: {0}")]
    Config(String),

    /// Storing or reading embeddings failed.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
