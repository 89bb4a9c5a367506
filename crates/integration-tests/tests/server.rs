//! The router served over TCP, as the backend reaches it.

use commerce_connector::routes;
use commerce_connector_integration_tests::{STORE, TestContext};

/// Serve the context's router on an ephemeral port.
async fn serve(ctx: &TestContext) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = ctx.app.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_health_and_readiness() {
    let ctx = TestContext::new();
    let base_url = serve(&ctx).await;
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("health request");
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert_eq!(health.text().await.expect("body"), "ok");

    let ready = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("readiness request");
    assert_eq!(ready.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let ctx = TestContext::new();
    let base_url = serve(&ctx).await;
    let client = reqwest::Client::new();

    let echoed = client
        .get(format!("{base_url}/health"))
        .header("x-request-id", "acm-42")
        .send()
        .await
        .expect("request");
    assert_eq!(
        echoed.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("acm-42")
    );

    let generated = client
        .post(format!("{base_url}/customer/delete"))
        .header("x-acm-uuid", STORE)
        .body("{}")
        .send()
        .await
        .expect("request");
    assert_eq!(generated.status(), reqwest::StatusCode::OK);
    assert!(generated.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_wrong_method_is_not_a_sync_response() {
    let ctx = TestContext::new();
    let base_url = serve(&ctx).await;

    let response = reqwest::Client::new()
        .get(format!("{base_url}/productstocksync"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn test_registered_ids_and_routes_are_unique() {
    let table = routes::resources();
    assert!(routes::validate(&table).is_ok());

    let mut ids: Vec<_> = table.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), table.len());
}
