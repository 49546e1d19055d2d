//! Integration tests for InsightShop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p insightshop-integration-tests
//!
//! # Database tests (PostgreSQL with the `vector` extension)
//! DATABASE_URL=postgres://localhost/insightshop cargo test -p insightshop-integration-tests -- --ignored
//! ```
//!
//! Most tests here need no database. [`TestApp`] builds the real router over
//! a lazily connected pool, so any request that reaches `PostgreSQL` fails;
//! those tests only drive paths that are decided before the first query.
//! The `database` tests are ignored by default and run each case in a
//! fresh migrated database via `#[sqlx::test]`.
//!
//! # Test Files
//!
//! - `tool_registry` - Built-in catalog, role filtering, argument validation
//! - `intent` - Message understanding feeding the catalog filter
//! - `api` - HTTP status codes and bodies through the full router
//! - `database` - Tool transactions, checkout stock, cancellation, returns

use std::path::PathBuf;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use insightshop_storefront::config::{CommerceConfig, StorefrontConfig};
use insightshop_storefront::middleware::create_session_layer;
use insightshop_storefront::routes;
use insightshop_storefront::state::AppState;

const DATABASE_URL: &str = "postgres://insightshop@localhost/insightshop_test";

/// Configuration with every optional integration disabled.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from(DATABASE_URL),
        host: [127, 0, 0, 1].into(),
        port: 5000,
        base_url: "http://localhost:5000".to_owned(),
        session_secret: SecretString::from("kT9wQ2mZ7vB4nX8rL3pF6sH1jD5gC0aE"),
        static_dir: PathBuf::from("frontend/dist"),
        commerce: CommerceConfig::default(),
        cron_token: None,
        claude: None,
        embeddings: None,
        email: None,
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// The API router over a pool that never connects unless queried.
pub struct TestApp {
    router: Router,
}

impl TestApp {
    /// # Panics
    ///
    /// Panics if the state can't be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy(DATABASE_URL)
            .expect("database URL parses");
        let session_layer = create_session_layer(&pool, &config);
        let state = AppState::new(config, pool).expect("state builds without integrations");
        let router = routes::routes().layer(session_layer).with_state(state);
        Self { router }
    }

    /// Send a guest request and return the status and JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the body isn't JSON.
    #[allow(clippy::expect_used)]
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let json = serde_json::from_slice(&bytes).expect("body is JSON");
        (status, json)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
