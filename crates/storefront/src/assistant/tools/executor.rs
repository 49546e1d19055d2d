//! Validated tool execution.

use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::{instrument, warn};

use crate::config::CommerceConfig;
use crate::db::RepositoryError;

use super::handlers::ToolRun;
use super::{ToolCallError, ToolContext, ToolError, ToolRegistry};

/// Runs tool calls against the database.
///
/// Every call is validated by the registry first. The handler then runs in
/// its own transaction, committed on success and rolled back on failure.
pub struct ToolExecutor<'a> {
    pool: &'a PgPool,
    registry: &'a ToolRegistry,
    commerce: CommerceConfig,
}

impl<'a> ToolExecutor<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, registry: &'a ToolRegistry, commerce: CommerceConfig) -> Self {
        Self {
            pool,
            registry,
            commerce,
        }
    }

    /// Validate and run a tool call.
    ///
    /// Handler failures are not errors here: they come back as
    /// `{"success": false, "message": ...}` so the model can react to them.
    /// Successful results always carry `"success": true`.
    ///
    /// # Errors
    ///
    /// Returns `ToolCallError` when the call is rejected by the registry.
    #[instrument(skip(self, args, ctx), fields(tool = %name, caller = ?ctx.caller))]
    pub async fn execute(
        &self,
        name: &str,
        args: &Value,
        ctx: &ToolContext,
    ) -> Result<Value, ToolCallError> {
        let tool = self.registry.validate_tool_call(name, args, ctx.caller)?;
        let mut args = args.clone();
        tool.schema.normalize_integers(&mut args);

        match self.run(name, &args, ctx).await {
            Ok(result) => Ok(success(result)),
            Err(e) => {
                if e.is_internal() {
                    tracing::error!(error = %e, "Tool failed");
                } else {
                    warn!(error = %e, "Tool rejected");
                }
                Ok(failure(&e.public_message()))
            }
        }
    }

    async fn run(&self, name: &str, args: &Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let result = ToolRun::new(&mut tx, ctx, self.commerce)
            .dispatch(name, args)
            .await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(result)
    }
}

/// Mark a handler result as successful.
fn success(result: Value) -> Value {
    match result {
        Value::Object(mut map) => {
            map.insert("success".to_owned(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "success": true, "data": other }),
    }
}

fn failure(message: &str) -> Value {
    json!({ "success": false, "message": message })
}

/// Result document for a call the registry rejected.
#[must_use]
pub fn rejection(err: &ToolCallError) -> Value {
    json!({
        "success": false,
        "error": err.code(),
        "message": err.to_string(),
        "violations": err.violations(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_marks_objects() {
        let value = success(json!({"count": 2}));
        assert_eq!(value, json!({"count": 2, "success": true}));
    }

    #[test]
    fn test_success_wraps_non_objects() {
        assert_eq!(success(json!([1, 2])), json!({"success": true, "data": [1, 2]}));
    }

    #[test]
    fn test_failure_shape() {
        assert_eq!(
            failure("only 2 of Wrap Dress in stock"),
            json!({"success": false, "message": "only 2 of Wrap Dress in stock"})
        );
    }

    #[test]
    fn test_rejection_lists_violations() {
        let registry = ToolRegistry::builtin().unwrap_or_else(|e| panic!("{e}"));
        let err = registry
            .validate_tool_call(
                "cart_add_item",
                &json!({"product_id": 1, "quantity": 500}),
                insightshop_core::CallerRole::User,
            )
            .err()
            .unwrap_or_else(|| panic!("expected rejection"));
        let value = rejection(&err);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "invalid_arguments");
        assert_eq!(value["violations"][0]["path"], "/quantity");
    }
}
