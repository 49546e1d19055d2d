//! Sale route handlers.
//!
//! The automation endpoint is meant for an external scheduler. It accepts
//! either the configured `X-Cron-Token` or an admin session.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};

use crate::error::{AppError, Result};
use crate::middleware::OptionalUser;
use crate::models::Sale;
use crate::services::SaleService;
use crate::services::sales::AutomationReport;
use crate::state::AppState;

use super::today;

/// Header carrying the scheduler's shared secret.
pub const CRON_TOKEN_HEADER: &str = "x-cron-token";

/// Build the sale router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(active))
        .route("/api/sales/automation/run", post(run_automation))
}

/// GET /api/sales
async fn active(State(state): State<AppState>) -> Result<Json<Vec<Sale>>> {
    let mut conn = state.pool().acquire().await?;
    let sales = SaleService::new(&mut conn).active(today()).await?;
    Ok(Json(sales))
}

/// POST /api/sales/automation/run
async fn run_automation(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
) -> Result<Json<AutomationReport>> {
    let token_ok = headers
        .get(CRON_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| state.config().cron_token_matches(token));
    let admin = user.as_ref().is_some_and(|u| u.is_admin);
    if !token_ok && !admin {
        return Err(AppError::Unauthorized(
            "a valid cron token or admin session is required".to_owned(),
        ));
    }

    let mut tx = state.pool().begin().await?;
    let report = SaleService::new(&mut tx).run_automation(today()).await?;
    tx.commit().await?;

    tracing::info!(
        created = report.created.len(),
        activated = report.activated.len(),
        deactivated = report.deactivated.len(),
        trigger = if token_ok { "cron" } else { "admin" },
        "Sale automation run"
    );
    Ok(Json(report))
}
