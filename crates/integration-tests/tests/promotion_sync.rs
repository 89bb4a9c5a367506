//! `POST /promotionsync` and the promotion queues behind it.

use serde_json::json;

use commerce_connector::config::QueueConfig;
use commerce_connector::queue::PromotionQueue;
use commerce_connector_core::QueueName;
use commerce_connector_integration_tests::{STORE, TestContext};

#[tokio::test]
async fn test_records_are_normalized() {
    let ctx = TestContext::new();

    let body = json!([
        {"code": "SUMMER", "enabled": "1", "sku": ["M-1"]},
        {"code": "WINTER", "name": "Winter sale", "rule_id": "77", "enabled": false},
    ]);
    let response = ctx.post("/promotionsync", Some(STORE), &body.to_string()).await;
    assert_eq!(
        response.json(),
        json!({"success": true, "processed": 2, "failed": 0})
    );

    let summer = ctx.memory.promotion("SUMMER").expect("stored by code");
    assert_eq!(summer.name, "SUMMER");
    assert_eq!(summer.rule_id, "SUMMER");
    assert!(summer.status);

    let winter = ctx.memory.promotion("77").expect("stored by rule id");
    assert_eq!(winter.name, "Winter sale");
    assert!(!winter.status);
}

#[tokio::test]
async fn test_single_object_and_codeless_records() {
    let ctx = TestContext::new();

    let single = ctx
        .post("/promotionsync", None, r#"{"code": "ONE", "enabled": 1}"#)
        .await;
    assert_eq!(single.json()["processed"], 1);

    let mixed = json!([{"name": "no code"}, {"code": "TWO"}, 3]);
    let response = ctx.post("/promotionsync", None, &mixed.to_string()).await;
    assert_eq!(
        response.json(),
        json!({"success": true, "processed": 1, "failed": 2})
    );
    assert_eq!(ctx.memory.promotion_count(), 2);
}

#[tokio::test]
async fn test_non_list_body_is_unsuccessful() {
    let ctx = TestContext::new();

    for body in ["\"SUMMER\"", "12", "{broken", ""] {
        let response = ctx.post("/promotionsync", None, body).await;
        assert_eq!(response.status, axum::http::StatusCode::OK);
        assert_eq!(response.json()["success"], false, "body {body:?}");
    }
    assert_eq!(ctx.memory.promotion_count(), 0);
}

#[tokio::test]
async fn test_replay_converges_without_new_queue_items() {
    let ctx = TestContext::new();
    let body = json!([{"code": "SUMMER", "enabled": true, "sku": ["M-1", "M-2"]}]).to_string();

    ctx.post("/promotionsync", Some(STORE), &body).await;
    let first = ctx.memory.promotion("SUMMER");
    ctx.post("/promotionsync", Some(STORE), &body).await;

    assert_eq!(ctx.memory.promotion("SUMMER"), first);
    assert_eq!(ctx.memory.promotion_count(), 1);
    let attach = ctx.memory.pending(QueueName::Attach).await.expect("queue");
    assert_eq!(attach.len(), 1);
}

#[tokio::test]
async fn test_queued_work_attaches_and_requests_repush() {
    let ctx = TestContext::new();
    ctx.memory.add_sku("M-1");
    ctx.memory.add_sku("M-2");

    let body = json!([{"code": "SUMMER", "enabled": true, "sku": ["M-1", "M-2"]}]);
    ctx.post("/promotionsync", Some(STORE), &body.to_string()).await;

    let runner = ctx.state.queue_runner(QueueConfig::default());
    let summary = runner.run_once().await.expect("queue run");
    assert_eq!(summary.processed, 1);

    assert_eq!(ctx.memory.attached_promotions("M-1"), vec!["SUMMER".to_owned()]);
    assert_eq!(
        ctx.api.sync_requests(),
        vec![(STORE.to_owned(), vec!["M-1".to_owned(), "M-2".to_owned()])]
    );

    // Disabling the promotion queues the detach
    let disabled = json!([{"code": "SUMMER", "enabled": false, "sku": ["M-1", "M-2"]}]);
    ctx.post("/promotionsync", Some(STORE), &disabled.to_string()).await;
    runner.run_once().await.expect("queue run");

    assert!(ctx.memory.attached_promotions("M-1").is_empty());
    assert_eq!(ctx.api.sync_requests().len(), 2);
}

#[tokio::test]
async fn test_failing_item_is_redelivered_then_failed() {
    let ctx = TestContext::new();
    ctx.memory.add_sku("M-1");
    ctx.memory.fail_next_attaches(10);

    let body = json!([{"code": "SUMMER", "enabled": true, "sku": ["M-1"]}]);
    ctx.post("/promotionsync", Some(STORE), &body.to_string()).await;

    let runner = ctx.state.queue_runner(QueueConfig {
        max_attempts: 2,
        ..QueueConfig::default()
    });

    let first = runner.run_once().await.expect("queue run");
    assert_eq!(first.requeued, 1);
    let second = runner.run_once().await.expect("queue run");
    assert_eq!(second.failed, 1);

    assert!(ctx.memory.pending(QueueName::Attach).await.expect("queue").is_empty());
    assert_eq!(ctx.memory.failed_items().len(), 1);
    assert!(ctx.memory.attached_promotions("M-1").is_empty());
}

#[tokio::test]
async fn test_reenabled_promotion_is_attached_after_one_run() {
    let ctx = TestContext::new();
    ctx.memory.add_sku("M-1");

    for enabled in [1, 0, 1] {
        let body = json!([{"code": "SUMMER", "enabled": enabled, "sku": ["M-1"]}]);
        ctx.post("/promotionsync", Some(STORE), &body.to_string()).await;
    }

    let runner = ctx.state.queue_runner(QueueConfig::default());
    let summary = runner.run_once().await.expect("queue run");

    assert_eq!(summary.processed, 3);
    assert_eq!(ctx.memory.attached_promotions("M-1"), vec!["SUMMER".to_owned()]);
    assert_eq!(ctx.memory.promotion_skus("SUMMER"), vec!["M-1".to_owned()]);
}

#[tokio::test]
async fn test_failed_queue_write_is_repaired_by_replay() {
    let ctx = TestContext::new();
    ctx.memory.add_sku("M-1");
    ctx.memory.fail_next_enqueues(1);
    let body = json!([{"code": "SUMMER", "enabled": true, "sku": ["M-1"]}]).to_string();

    let first = ctx.post("/promotionsync", Some(STORE), &body).await;
    assert_eq!(first.json()["failed"], 1);

    let replay = ctx.post("/promotionsync", Some(STORE), &body).await;
    assert_eq!(replay.json()["processed"], 1);

    let runner = ctx.state.queue_runner(QueueConfig::default());
    runner.run_once().await.expect("queue run");
    assert_eq!(ctx.memory.attached_promotions("M-1"), vec!["SUMMER".to_owned()]);
}
