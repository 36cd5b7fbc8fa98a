//! Health and metrics endpoint tests.

mod common;

use serde_json::Value;

#[tokio::test]
async fn health_check_works() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("health request failed");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("health body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "inventory-service");
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("metrics request failed");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("metrics body");
    assert!(body.contains("inventory_db_query_duration_seconds"));
}
