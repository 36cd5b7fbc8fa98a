//! Product and catalog integration tests.

mod common;

use common::decimal;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn create_product_assigns_default_unit() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };

    let product = app
        .create_product(json!({
            "name": format!("Unitless {}", Uuid::new_v4()),
            "purchase_price": "1.00",
            "sell_price": "1.50"
        }))
        .await;

    // No unit supplied: the creator ensures and assigns the default one.
    assert!(product["unit_id"].is_string());

    let units: Vec<Value> = app
        .client
        .get(format!("{}/units", app.address))
        .send()
        .await
        .expect("list units failed")
        .json()
        .await
        .expect("units body");
    assert!(units.iter().any(|u| u["name"] == "piece"));
}

#[tokio::test]
async fn product_crud_roundtrip() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };

    let provider_id = app.create_provider().await;
    let barcode = format!("bc-{}", Uuid::new_v4());

    let product = app
        .create_product(json!({
            "name": "Roundtrip widget",
            "barcode": barcode,
            "provider_id": provider_id,
            "purchase_price": "2.00",
            "sell_price": "3.00",
            "stock": 7
        }))
        .await;
    let product_id = product["product_id"].as_str().expect("product_id");
    assert_eq!(product["stock"], 7);
    assert_eq!(decimal(&product["purchase_price"]), Decimal::new(200, 2));

    // Partial update leaves the rest alone.
    let response = app
        .client
        .patch(format!("{}/products/{}", app.address, product_id))
        .json(&json!({ "sell_price": "3.25" }))
        .send()
        .await
        .expect("patch failed");
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.expect("patched product");
    assert_eq!(decimal(&updated["sell_price"]), Decimal::new(325, 2));
    assert_eq!(decimal(&updated["purchase_price"]), Decimal::new(200, 2));
    assert_eq!(updated["stock"], 7);

    // Listing by provider and barcode finds it.
    let listed: Vec<Value> = app
        .client
        .get(format!(
            "{}/products?provider_id={}&barcode={}",
            app.address, provider_id, product["barcode"].as_str().unwrap()
        ))
        .send()
        .await
        .expect("list failed")
        .json()
        .await
        .expect("list body");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["product_id"], product["product_id"]);

    // Delete, then the product is gone.
    let response = app
        .client
        .delete(format!("{}/products/{}", app.address, product_id))
        .send()
        .await
        .expect("delete failed");
    assert_eq!(response.status(), 204);

    let response = app
        .client
        .get(format!("{}/products/{}", app.address, product_id))
        .send()
        .await
        .expect("get failed");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn price_history_starts_empty() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };

    let product = app
        .create_product(json!({
            "name": format!("Fresh {}", Uuid::new_v4()),
            "purchase_price": "1.00",
            "sell_price": "2.00"
        }))
        .await;

    let history: Vec<Value> = app
        .client
        .get(format!(
            "{}/products/{}/price-history",
            app.address,
            product["product_id"].as_str().unwrap()
        ))
        .send()
        .await
        .expect("history failed")
        .json()
        .await
        .expect("history body");
    assert!(history.is_empty());
}

#[tokio::test]
async fn duplicate_category_name_conflicts() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };

    let name = format!("Drinks {}", Uuid::new_v4());
    let response = app
        .client
        .post(format!("{}/categories", app.address))
        .json(&json!({ "name": name }))
        .send()
        .await
        .expect("create category failed");
    assert_eq!(response.status(), 201);

    let response = app
        .client
        .post(format!("{}/categories", app.address))
        .json(&json!({ "name": name }))
        .send()
        .await
        .expect("duplicate category failed");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn invalid_product_payload_is_rejected() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };

    // Empty name fails boundary validation before any persistence.
    let response = app
        .client
        .post(format!("{}/products", app.address))
        .json(&json!({
            "name": "",
            "purchase_price": "1.00",
            "sell_price": "2.00"
        }))
        .send()
        .await
        .expect("create failed");
    assert_eq!(response.status(), 422);
}
