//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::assistant::tools::{RegistryError, ToolRegistry};
use crate::claude::{ClaudeClient, ClaudeError};
use crate::config::StorefrontConfig;
use crate::embeddings::{EmbeddingClient, EmbeddingError, ProductIndexer};
use crate::services::EmailService;

/// Error building application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("tool registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("Claude client: {0}")]
    Claude(#[from] ClaudeError),
    #[error("embedding client: {0}")]
    Embeddings(#[from] EmbeddingError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    claude: Option<ClaudeClient>,
    embeddings: Option<EmbeddingClient>,
    email: EmailService,
    tools: ToolRegistry,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Optional integrations (Claude, embeddings, SMTP) are built only when
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool catalog is invalid or a configured
    /// client can't be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let tools = ToolRegistry::builtin()?;
        let claude = config.claude.as_ref().map(ClaudeClient::new).transpose()?;
        let embeddings = config
            .embeddings
            .as_ref()
            .map(EmbeddingClient::new)
            .transpose()?;
        let email = EmailService::new(config.email.as_ref(), &config.base_url)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                claude,
                embeddings,
                email,
                tools,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Claude client, if the assistant's LLM is configured.
    #[must_use]
    pub fn claude(&self) -> Option<&ClaudeClient> {
        self.inner.claude.as_ref()
    }

    /// Embedding client, if semantic search is configured.
    #[must_use]
    pub fn embeddings(&self) -> Option<&EmbeddingClient> {
        self.inner.embeddings.as_ref()
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// The assistant tool catalog.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    /// Vector index maintainer, if semantic search is configured.
    #[must_use]
    pub fn indexer(&self) -> Option<ProductIndexer> {
        self.embeddings()
            .map(|client| ProductIndexer::new(self.pool().clone(), client.clone()))
    }
}
