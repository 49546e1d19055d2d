//! The fixed catalog of tools the assistant may call.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use insightshop_core::{CallerRole, ToolPermission};

use crate::claude::Tool;

use super::ToolCallError;
use super::schema::{Schema, SchemaError};

const BUILTIN_CATALOG: &str = include_str!("catalog.json");

/// A catalog that can't be loaded.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid tool catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tool `{tool}`: {source}")]
    Schema {
        tool: String,
        #[source]
        source: SchemaError,
    },

    #[error("duplicate tool name `{0}`")]
    Duplicate(String),
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    description: String,
    permission: ToolPermission,
    input_schema: Value,
}

/// A tool the assistant may call.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub permission: ToolPermission,
    /// Schema document as sent to the model.
    pub input_schema: Value,
    /// Parsed form used for validation.
    pub schema: Schema,
}

impl ToolDefinition {
    /// The model-facing description.
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Tool catalog with permission and argument checks.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the embedded catalog is malformed.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog from its JSON form: an array of
    /// `{name, description, permission, input_schema}`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` for malformed JSON, unparseable schemas, or
    /// repeated names.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        let mut tools = Vec::with_capacity(entries.len());
        let mut by_name = HashMap::with_capacity(entries.len());

        for entry in entries {
            let schema = Schema::parse(&entry.input_schema).map_err(|source| {
                RegistryError::Schema {
                    tool: entry.name.clone(),
                    source,
                }
            })?;
            if by_name.insert(entry.name.clone(), tools.len()).is_some() {
                return Err(RegistryError::Duplicate(entry.name));
            }
            tools.push(ToolDefinition {
                name: entry.name,
                description: entry.description,
                permission: entry.permission,
                input_schema: entry.input_schema,
                schema,
            });
        }

        Ok(Self { tools, by_name })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.by_name.get(name).and_then(|&i| self.tools.get(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions `caller` may use, in catalog order.
    pub fn definitions_for(&self, caller: CallerRole) -> impl Iterator<Item = &ToolDefinition> {
        self.tools
            .iter()
            .filter(move |t| caller.satisfies(t.permission))
    }

    /// The tool list sent to the model for `caller`.
    #[must_use]
    pub fn tools_for(&self, caller: CallerRole) -> Vec<Tool> {
        self.definitions_for(caller)
            .map(ToolDefinition::to_tool)
            .collect()
    }

    /// Check that `caller` may call `name` with `args`.
    ///
    /// # Errors
    ///
    /// - `UnknownTool` if the name isn't in the catalog
    /// - `LoginRequired` if a guest calls a user tool
    /// - `PermissionDenied` if a non-admin calls an admin tool
    /// - `InvalidArguments` listing every schema violation
    pub fn validate_tool_call(
        &self,
        name: &str,
        args: &Value,
        caller: CallerRole,
    ) -> Result<&ToolDefinition, ToolCallError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolCallError::UnknownTool(name.to_owned()))?;

        if !caller.satisfies(tool.permission) {
            return Err(match tool.permission {
                ToolPermission::User => ToolCallError::LoginRequired(name.to_owned()),
                _ => ToolCallError::PermissionDenied(name.to_owned()),
            });
        }

        let violations = tool.schema.validate(args);
        if !violations.is_empty() {
            return Err(ToolCallError::InvalidArguments {
                tool: name.to_owned(),
                violations,
            });
        }

        Ok(tool)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let registry = ToolRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 20);
        assert_eq!(
            registry.get("cart_add_item").map(|t| t.permission),
            Some(ToolPermission::User)
        );
    }

    #[test]
    fn test_tools_for_filters_by_role() {
        let registry = ToolRegistry::builtin().unwrap();
        let guest = registry.tools_for(CallerRole::Guest);
        let user = registry.tools_for(CallerRole::User);
        let admin = registry.tools_for(CallerRole::Admin);

        assert_eq!(guest.len(), 5);
        assert_eq!(user.len(), 13);
        assert_eq!(admin.len(), 20);
        assert!(guest.iter().all(|t| !t.name.starts_with("cart_")));
        assert!(user.iter().all(|t| !t.name.starts_with("admin_")));
    }

    #[test]
    fn test_validate_unknown_and_permissions() {
        let registry = ToolRegistry::builtin().unwrap();
        assert!(matches!(
            registry.validate_tool_call("drop_tables", &json!({}), CallerRole::Admin),
            Err(ToolCallError::UnknownTool(_))
        ));
        assert!(matches!(
            registry.validate_tool_call("cart_view", &json!({}), CallerRole::Guest),
            Err(ToolCallError::LoginRequired(_))
        ));
        assert!(matches!(
            registry.validate_tool_call(
                "admin_product_delete",
                &json!({"product_id": 1}),
                CallerRole::User
            ),
            Err(ToolCallError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_permission_checked_before_arguments() {
        let registry = ToolRegistry::builtin().unwrap();
        assert!(matches!(
            registry.validate_tool_call("admin_stock_update", &json!("junk"), CallerRole::Guest),
            Err(ToolCallError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_validate_arguments() {
        let registry = ToolRegistry::builtin().unwrap();
        let err = registry
            .validate_tool_call(
                "cart_add_item",
                &json!({"product_id": 0, "quantity": 100, "gift": true}),
                CallerRole::User,
            )
            .unwrap_err();
        let ToolCallError::InvalidArguments { violations, .. } = err else {
            panic!("expected InvalidArguments");
        };
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["/gift", "/product_id", "/quantity"]);

        assert!(
            registry
                .validate_tool_call(
                    "cart_add_item",
                    &json!({"product_id": 4, "quantity": 2, "size": "M"}),
                    CallerRole::User
                )
                .is_ok()
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"[
            {"name": "a", "description": "", "permission": "public", "input_schema": {"type": "object"}},
            {"name": "a", "description": "", "permission": "public", "input_schema": {"type": "object"}}
        ]"#;
        assert!(matches!(
            ToolRegistry::from_json(json),
            Err(RegistryError::Duplicate(_))
        ));
    }

    #[test]
    fn test_bad_schema_names_tool() {
        let json = r#"[
            {"name": "broken", "description": "", "permission": "admin", "input_schema": {"type": "uuid"}}
        ]"#;
        let err = ToolRegistry::from_json(json).unwrap_err();
        assert!(err.to_string().starts_with("tool `broken`"));
    }
}
