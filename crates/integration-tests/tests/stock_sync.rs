//! `POST /productstocksync`

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use commerce_connector_core::StoreUuid;
use commerce_connector_integration_tests::{STORE, TestContext};

#[tokio::test]
async fn test_batch_with_one_failure_applies_the_rest() {
    let ctx = TestContext::new();
    for sku in ["M-1", "M-2", "M-3", "M-4"] {
        ctx.memory.add_sku(sku);
    }
    ctx.memory.fail_stock_for("M-3");

    let body = json!({"sku": [
        {"sku": "M-1", "qty": 5, "is_in_stock": 1},
        {"sku": "M-2", "qty": "2.5"},
        {"sku": "M-3", "qty": 1},
        {"sku": "M-4", "qty": 0},
    ]});
    let response = ctx
        .post("/productstocksync", Some(STORE), &body.to_string())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"success": true, "processed": 3, "failed": 1})
    );

    let store = StoreUuid::new(STORE);
    assert_eq!(
        ctx.memory.stock(&store, "M-1").map(|s| s.qty),
        Some(Decimal::new(5, 0))
    );
    assert_eq!(
        ctx.memory.stock(&store, "M-2").map(|s| s.qty),
        Some(Decimal::new(25, 1))
    );
    assert!(ctx.memory.stock(&store, "M-3").is_none());
    assert_eq!(ctx.memory.stock(&store, "M-4").map(|s| s.is_in_stock), Some(false));
}

#[tokio::test]
async fn test_stock_is_kept_per_store() {
    let ctx = TestContext::new();
    ctx.memory.add_sku("M-1");

    let en = json!({"sku": [{"sku": "M-1", "qty": 4}]});
    let ar = json!({"sku": [{"sku": "M-1", "qty": 9}]});
    ctx.post("/productstocksync", Some("uuid-en"), &en.to_string())
        .await;
    ctx.post("/productstocksync", Some("uuid-ar"), &ar.to_string())
        .await;

    let qty = |store: &str| ctx.memory.stock(&StoreUuid::new(store), "M-1").map(|s| s.qty);
    assert_eq!(qty("uuid-en"), Some(Decimal::new(4, 0)));
    assert_eq!(qty("uuid-ar"), Some(Decimal::new(9, 0)));
}

#[tokio::test]
async fn test_missing_sku_list_is_unsuccessful_but_200() {
    let ctx = TestContext::new();

    for body in [r"{}", r#"{"sku": "M-1"}"#, "not json", ""] {
        let response = ctx.post("/productstocksync", Some(STORE), body).await;
        assert_eq!(response.status, StatusCode::OK, "body {body:?}");
        assert_eq!(response.json()["success"], false, "body {body:?}");
    }
}

#[tokio::test]
async fn test_unknown_skus_are_counted_not_fatal() {
    let ctx = TestContext::new();
    ctx.memory.add_sku("M-1");

    let body = json!({"sku": [{"sku": "ghost", "qty": 1}, {"sku": "M-1", "qty": 1}, "garbage"]});
    let response = ctx.post("/productstocksync", None, &body.to_string()).await;

    assert_eq!(
        response.json(),
        json!({"success": true, "processed": 1, "failed": 2})
    );
}
