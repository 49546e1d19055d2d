//! Integration tests for the HTTP API.
//!
//! Each request is decided before any database access, so these run without
//! `PostgreSQL`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use insightshop_integration_tests::TestApp;
use serde_json::json;

// =============================================================================
// Assistant tools
// =============================================================================

#[tokio::test]
async fn test_guest_sees_only_public_tools() {
    let app = TestApp::new();
    let (status, body) = app.request("GET", "/api/ai/tools", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);
    let tools = body["tools"].as_array().unwrap();
    assert!(tools.iter().all(|t| t["permission"] == "public"));
    assert!(tools.iter().any(|t| t["name"] == "product_search"));
    assert_eq!(tools[0]["input_schema"]["type"], "object");
}

#[tokio::test]
async fn test_execute_unknown_tool_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            "POST",
            "/api/ai/tools/execute",
            Some(json!({"tool": "order_refund_everything"})),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_tool");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_execute_rejects_guest_by_permission_level() {
    let app = TestApp::new();

    let (status, body) = app
        .request("POST", "/api/ai/tools/execute", Some(json!({"tool": "cart_view"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "login_required");

    let (status, body) = app
        .request(
            "POST",
            "/api/ai/tools/execute",
            Some(json!({"tool": "admin_product_delete", "arguments": {"product_id": 1}})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");
}

#[tokio::test]
async fn test_execute_reports_schema_violations() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            "POST",
            "/api/ai/tools/execute",
            Some(json!({"tool": "product_get", "arguments": {"product_id": 0}})),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_arguments");
    let violations = body["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["path"], "/product_id");
}

// =============================================================================
// Access control
// =============================================================================

#[tokio::test]
async fn test_member_and_admin_routes_require_login() {
    let app = TestApp::new();

    for uri in ["/api/members/me", "/api/admin/users", "/api/ai/sessions"] {
        let (status, body) = app.request("GET", uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

// =============================================================================
// Shipping
// =============================================================================

#[tokio::test]
async fn test_shipping_rates() {
    let app = TestApp::new();

    let (status, body) = app
        .request("GET", "/api/shipping/rates?subtotal=30", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let quotes = body.as_array().unwrap();
    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[0]["method"], "standard");
    assert!(quotes[0]["free_shipping_gap"].is_string());

    let (_, body) = app
        .request("GET", "/api/shipping/rates?subtotal=75", None)
        .await;
    assert!(body[0].get("free_shipping_gap").is_none());

    let (status, _) = app
        .request("GET", "/api/shipping/rates?subtotal=-1", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
