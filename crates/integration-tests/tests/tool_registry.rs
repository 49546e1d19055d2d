//! Integration tests for the assistant tool catalog.
//!
//! These cover the catalog as shipped, the view each role gets of it, and
//! the rejection payloads the model sees.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use insightshop_core::{CallerRole, ToolPermission};
use insightshop_storefront::assistant::tools::{ToolCallError, ToolRegistry, rejection};
use serde_json::json;

fn registry() -> ToolRegistry {
    ToolRegistry::builtin().unwrap()
}

// =============================================================================
// Catalog
// =============================================================================

#[test]
fn test_builtin_catalog_size_by_permission() {
    let registry = registry();
    assert_eq!(registry.len(), 20);

    let count = |permission| {
        registry
            .definitions_for(CallerRole::Admin)
            .filter(|t| t.permission == permission)
            .count()
    };
    assert_eq!(count(ToolPermission::Public), 5);
    assert_eq!(count(ToolPermission::User), 8);
    assert_eq!(count(ToolPermission::Admin), 7);
}

#[test]
fn test_tool_names_use_domain_prefixes() {
    let registry = registry();
    for tool in registry.definitions_for(CallerRole::Admin) {
        let admin_named = tool.name.starts_with("admin_");
        assert_eq!(
            admin_named,
            tool.permission == ToolPermission::Admin,
            "{} has permission {:?}",
            tool.name,
            tool.permission
        );
        assert!(!tool.description.is_empty(), "{} has no description", tool.name);
        assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
    }
}

#[test]
fn test_each_role_sees_a_superset_of_the_one_below() {
    let registry = registry();
    let names = |role| -> Vec<String> {
        registry
            .tools_for(role)
            .into_iter()
            .map(|t| t.name)
            .collect()
    };
    let guest = names(CallerRole::Guest);
    let user = names(CallerRole::User);
    let admin = names(CallerRole::Admin);

    assert_eq!((guest.len(), user.len(), admin.len()), (5, 13, 20));
    assert!(guest.iter().all(|n| user.contains(n)));
    assert!(user.iter().all(|n| admin.contains(n)));
    assert!(!user.iter().any(|n| n.starts_with("admin_")));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_guest_is_asked_to_log_in_for_cart_tools() {
    let err = registry()
        .validate_tool_call("cart_view", &json!({}), CallerRole::Guest)
        .unwrap_err();
    assert!(matches!(err, ToolCallError::LoginRequired(_)));

    let body = rejection(&err);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "login_required");
    assert!(body["violations"].as_array().unwrap().is_empty());
}

#[test]
fn test_signed_in_user_cannot_call_admin_tools() {
    let err = registry()
        .validate_tool_call(
            "admin_stock_update",
            &json!({"product_id": 1, "stock_quantity": 5}),
            CallerRole::User,
        )
        .unwrap_err();
    assert!(matches!(err, ToolCallError::PermissionDenied(_)));
    assert_eq!(err.code(), "permission_denied");
}

#[test]
fn test_invalid_arguments_list_every_violation() {
    let err = registry()
        .validate_tool_call(
            "cart_add_item",
            &json!({"product_id": "seven", "quantity": 500, "gift_wrap": true}),
            CallerRole::User,
        )
        .unwrap_err();

    let ToolCallError::InvalidArguments { tool, violations } = &err else {
        panic!("expected invalid arguments, got {err:?}");
    };
    assert_eq!(tool, "cart_add_item");
    assert_eq!(violations.len(), 3, "{violations:?}");

    let body = rejection(&err);
    assert_eq!(body["error"], "invalid_arguments");
    assert_eq!(body["violations"].as_array().unwrap().len(), 3);
}

#[test]
fn test_valid_calls_return_the_definition() {
    let registry = registry();
    let tool = registry
        .validate_tool_call(
            "product_search",
            &json!({"category": "women", "max_price": 80, "limit": 5}),
            CallerRole::Guest,
        )
        .unwrap();
    assert_eq!(tool.name, "product_search");

    assert!(
        registry
            .validate_tool_call("admin_product_delete", &json!({"product_id": 3}), CallerRole::Admin)
            .is_ok()
    );
}

#[test]
fn test_unknown_tool_checked_before_permissions() {
    let err = registry()
        .validate_tool_call("admin_drop_tables", &json!({}), CallerRole::Guest)
        .unwrap_err();
    assert!(matches!(err, ToolCallError::UnknownTool(ref name) if name == "admin_drop_tables"));
}
