//! `POST /customer/delete`

use serde_json::json;
use tracing::Level;

use commerce_connector_core::Email;
use commerce_connector_integration_tests::{LogCounter, TestContext};

fn email(value: &str) -> Email {
    Email::parse(value).unwrap_or_else(|e| panic!("test email {value}: {e}"))
}

#[tokio::test]
async fn test_missing_email_logs_one_error_and_touches_nothing() {
    let ctx = TestContext::new();
    ctx.memory.add_customer(&email("jane@example.com"));
    let logs = LogCounter::default();
    let _guard = logs.install();

    let response = ctx.post("/customer/delete", None, "{}").await;

    assert_eq!(response.status, axum::http::StatusCode::OK);
    assert_eq!(response.json()["success"], false);
    assert_eq!(logs.count(Level::ERROR), 1);
    assert_eq!(ctx.memory.customer_calls(), (0, 0));
    assert_eq!(ctx.memory.customer_count(), 1);
}

#[tokio::test]
async fn test_blank_and_malformed_email_are_rejected() {
    let ctx = TestContext::new();

    for body in [
        json!({"email": "   "}),
        json!({"email": "not-an-email"}),
        json!({"email": 42}),
    ] {
        let logs = LogCounter::default();
        let _guard = logs.install();

        let response = ctx.post("/customer/delete", None, &body.to_string()).await;
        assert_eq!(response.json()["success"], false, "body {body}");
        assert_eq!(logs.count(Level::ERROR), 1, "body {body}");
    }
    assert_eq!(ctx.memory.customer_calls(), (0, 0));
}

#[tokio::test]
async fn test_unknown_customer_succeeds_with_warning() {
    let ctx = TestContext::new();
    let logs = LogCounter::default();
    let _guard = logs.install();

    let response = ctx
        .post("/customer/delete", None, r#"{"email": "missing@x.com"}"#)
        .await;

    assert_eq!(response.json(), json!({"success": true}));
    assert_eq!(logs.count(Level::WARN), 1);
    assert_eq!(logs.count(Level::ERROR), 0);
    assert_eq!(ctx.memory.customer_calls(), (1, 0));
}

#[tokio::test]
async fn test_known_customer_is_deleted() {
    let ctx = TestContext::new();
    ctx.memory.add_customer(&email("jane@example.com"));

    let response = ctx
        .post("/customer/delete", None, r#"{"email": " jane@EXAMPLE.com "}"#)
        .await;

    assert_eq!(response.json()["success"], true);
    assert_eq!(ctx.memory.customer_count(), 0);
}

#[tokio::test]
async fn test_storage_failure_is_logged_and_acknowledged() {
    let ctx = TestContext::new();
    ctx.memory.add_customer(&email("jane@example.com"));
    ctx.memory.fail_customer_deletes(true);
    let logs = LogCounter::default();
    let _guard = logs.install();

    let response = ctx
        .post("/customer/delete", None, r#"{"email": "jane@example.com"}"#)
        .await;

    assert_eq!(response.json()["success"], true);
    assert_eq!(logs.count(Level::ERROR), 1);
    assert_eq!(ctx.memory.customer_count(), 1);
}

#[tokio::test]
async fn test_email_case_does_not_hide_customer() {
    let ctx = TestContext::new();
    ctx.memory.add_customer(&email("jane@example.com"));

    let response = ctx
        .post("/customer/delete", None, r#"{"email": "Jane@Example.com"}"#)
        .await;

    assert_eq!(response.json(), json!({"success": true}));
    assert_eq!(ctx.memory.customer_calls(), (1, 1));
    assert_eq!(ctx.memory.customer_count(), 0);
}
