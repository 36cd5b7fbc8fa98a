//! Purchase-invoice reconciliation integration tests.

mod common;

use common::{decimal, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

async fn provider_and_branch(app: &TestApp) -> (Uuid, Uuid) {
    (app.create_provider().await, app.create_branch().await)
}

#[tokio::test]
async fn unmatched_barcode_creates_product_with_stock() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;
    let barcode = format!("bc-{}", Uuid::new_v4());

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1001",
            "invoice_date": "2025-03-01",
            "items": [{
                "barcode": barcode,
                "product_name": "Widget",
                "quantity": 5,
                "unit_price": "2.00",
                "sell_price": "3.00",
                "is_bonus": false
            }]
        }))
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("invoice body");

    assert_eq!(decimal(&body["total_amount"]), Decimal::new(1000, 2));
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    // The product was created under the invoice's provider with the
    // submitted prices and the full quantity as stock.
    let products: Vec<Value> = app
        .client
        .get(format!("{}/products?barcode={}", app.address, barcode))
        .send()
        .await
        .expect("list products failed")
        .json()
        .await
        .expect("products body");
    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product["name"], "Widget");
    assert_eq!(product["stock"], 5);
    assert_eq!(product["provider_id"].as_str().unwrap(), provider_id.to_string());
    assert_eq!(decimal(&product["purchase_price"]), Decimal::new(200, 2));
    assert_eq!(decimal(&product["sell_price"]), Decimal::new(300, 2));
    assert_eq!(product["active"], true);

    // A freshly created product has no price history.
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
async fn changed_price_updates_product_and_records_history() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;
    let barcode = format!("bc-{}", Uuid::new_v4());

    let product = app
        .create_product(json!({
            "name": "Existing widget",
            "barcode": barcode,
            "provider_id": provider_id,
            "purchase_price": "2.00",
            "sell_price": "3.00"
        }))
        .await;
    let product_id = product["product_id"].as_str().unwrap();

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1002",
            "invoice_date": "2025-03-02",
            "items": [{
                "barcode": barcode,
                "product_name": "Existing widget",
                "quantity": 2,
                "unit_price": "2.50",
                "sell_price": "3.00",
                "is_bonus": false
            }]
        }))
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("invoice body");
    assert_eq!(decimal(&body["total_amount"]), Decimal::new(500, 2));

    let updated = app.get_product(product_id).await;
    assert_eq!(decimal(&updated["purchase_price"]), Decimal::new(250, 2));
    assert_eq!(updated["stock"], 2);

    let history: Vec<Value> = app
        .client
        .get(format!(
            "{}/products/{}/price-history",
            app.address, product_id
        ))
        .send()
        .await
        .expect("history failed")
        .json()
        .await
        .expect("history body");
    assert_eq!(history.len(), 1);
    let change = &history[0];
    assert_eq!(decimal(&change["old_purchase_price"]), Decimal::new(200, 2));
    assert_eq!(decimal(&change["new_purchase_price"]), Decimal::new(250, 2));
    assert_eq!(decimal(&change["old_sell_price"]), Decimal::new(300, 2));
    assert_eq!(decimal(&change["new_sell_price"]), Decimal::new(300, 2));
    assert_eq!(change["change_reason"], "invoice_update");
    assert!(change["note"].as_str().unwrap().contains("INV-1002"));
}

#[tokio::test]
async fn matching_price_records_no_history() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;
    let barcode = format!("bc-{}", Uuid::new_v4());

    let product = app
        .create_product(json!({
            "name": "Stable widget",
            "barcode": barcode,
            "provider_id": provider_id,
            "purchase_price": "2.00",
            "sell_price": "3.00"
        }))
        .await;

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1003",
            "invoice_date": "2025-03-03",
            "items": [{
                "barcode": barcode,
                "product_name": "Stable widget",
                "quantity": 3,
                "unit_price": "2.00",
                "sell_price": "3.00",
                "is_bonus": false
            }]
        }))
        .await;
    assert_eq!(response.status(), 201);

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
async fn bonus_item_adds_stock_at_zero_cost() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;
    let barcode = format!("bc-{}", Uuid::new_v4());

    let product = app
        .create_product(json!({
            "name": "Bonus widget",
            "barcode": barcode,
            "provider_id": provider_id,
            "purchase_price": "2.00",
            "sell_price": "3.00"
        }))
        .await;

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1004",
            "invoice_date": "2025-03-04",
            "items": [{
                "barcode": barcode,
                "product_name": "Bonus widget",
                "quantity": 2,
                "unit_price": "2.50",
                "sell_price": "3.00",
                "is_bonus": true
            }]
        }))
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("invoice body");

    // Bonus contributes nothing to the total but the item still records the
    // submitted price, and stock still grows.
    assert_eq!(decimal(&body["total_amount"]), Decimal::ZERO);
    let item = &body["items"].as_array().unwrap()[0];
    assert_eq!(decimal(&item["purchase_price"]), Decimal::new(250, 2));
    assert_eq!(item["is_bonus"], true);

    let updated = app.get_product(product["product_id"].as_str().unwrap()).await;
    assert_eq!(updated["stock"], 2);
}

#[tokio::test]
async fn mixed_items_total_counts_only_non_bonus_lines() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1005",
            "invoice_date": "2025-03-05",
            "items": [
                {
                    "product_name": "Alpha",
                    "quantity": 5,
                    "unit_price": "2.00",
                    "sell_price": "3.00",
                    "is_bonus": false
                },
                {
                    "product_name": "Beta",
                    "quantity": 2,
                    "unit_price": "2.50",
                    "sell_price": "4.00",
                    "is_bonus": false
                },
                {
                    "product_name": "Gamma",
                    "quantity": 4,
                    "unit_price": "9.99",
                    "sell_price": "12.00",
                    "is_bonus": true
                }
            ]
        }))
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("invoice body");

    // 5 x 2.00 + 2 x 2.50 + 0 = 15.00
    assert_eq!(decimal(&body["total_amount"]), Decimal::new(1500, 2));
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn resolves_by_product_id_before_barcode() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;

    let product = app
        .create_product(json!({
            "name": "By-id widget",
            "provider_id": provider_id,
            "purchase_price": "1.00",
            "sell_price": "2.00"
        }))
        .await;
    let product_id = product["product_id"].as_str().unwrap();

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1006",
            "invoice_date": "2025-03-06",
            "items": [{
                "product_id": product_id,
                "quantity": 4,
                "unit_price": "1.00",
                "sell_price": "2.00",
                "is_bonus": false
            }]
        }))
        .await;
    assert_eq!(response.status(), 201);

    let updated = app.get_product(product_id).await;
    assert_eq!(updated["stock"], 4);
}

#[tokio::test]
async fn unidentifiable_item_rolls_back_the_whole_run() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1007",
            "invoice_date": "2025-03-07",
            "items": [
                {
                    "product_name": "Valid line",
                    "quantity": 1,
                    "unit_price": "1.00",
                    "sell_price": "2.00",
                    "is_bonus": false
                },
                {
                    "barcode": "",
                    "product_name": "",
                    "quantity": 1,
                    "unit_price": "1.00",
                    "sell_price": "2.00",
                    "is_bonus": false
                }
            ]
        }))
        .await;
    assert_eq!(response.status(), 400);

    // Nothing survived the rollback: no invoice, not even the valid line's
    // product.
    let invoices: Vec<Value> = app
        .client
        .get(format!(
            "{}/purchase-invoices?provider_id={}",
            app.address, provider_id
        ))
        .send()
        .await
        .expect("list invoices failed")
        .json()
        .await
        .expect("invoices body");
    assert!(invoices.is_empty());

    let products: Vec<Value> = app
        .client
        .get(format!("{}/products?provider_id={}", app.address, provider_id))
        .send()
        .await
        .expect("list products failed")
        .json()
        .await
        .expect("products body");
    assert!(products.is_empty());
}

#[tokio::test]
async fn zero_price_for_existing_product_is_rejected() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;
    let barcode = format!("bc-{}", Uuid::new_v4());

    let product = app
        .create_product(json!({
            "name": "Priced widget",
            "barcode": barcode,
            "provider_id": provider_id,
            "purchase_price": "2.00",
            "sell_price": "3.00"
        }))
        .await;

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1008",
            "invoice_date": "2025-03-08",
            "items": [{
                "barcode": barcode,
                "product_name": "Priced widget",
                "quantity": 1,
                "unit_price": "0.00",
                "sell_price": "3.00",
                "is_bonus": false
            }]
        }))
        .await;
    assert_eq!(response.status(), 400);

    // Stock and prices untouched by the rejected run.
    let updated = app.get_product(product["product_id"].as_str().unwrap()).await;
    assert_eq!(updated["stock"], 0);
    assert_eq!(decimal(&updated["purchase_price"]), Decimal::new(200, 2));
}

#[tokio::test]
async fn unknown_provider_is_rejected() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let branch_id = app.create_branch().await;

    let response = app
        .reconcile(json!({
            "provider_id": Uuid::new_v4(),
            "branch_id": branch_id,
            "invoice_number": "INV-1009",
            "invoice_date": "2025-03-09",
            "items": [{
                "product_name": "Orphan",
                "quantity": 1,
                "unit_price": "1.00",
                "sell_price": "2.00",
                "is_bonus": false
            }]
        }))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn invoice_listing_filters_by_provider() {
    let Some(app) = common::try_spawn_app().await else {
        return;
    };
    let (provider_id, branch_id) = provider_and_branch(&app).await;

    let response = app
        .reconcile(json!({
            "provider_id": provider_id,
            "branch_id": branch_id,
            "invoice_number": "INV-1010",
            "invoice_date": "2025-03-10",
            "items": [{
                "product_name": "Listed widget",
                "quantity": 1,
                "unit_price": "1.00",
                "sell_price": "2.00",
                "is_bonus": false
            }]
        }))
        .await;
    assert_eq!(response.status(), 201);

    let invoices: Vec<Value> = app
        .client
        .get(format!(
            "{}/purchase-invoices?provider_id={}",
            app.address, provider_id
        ))
        .send()
        .await
        .expect("list invoices failed")
        .json()
        .await
        .expect("invoices body");
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["invoice_number"], "INV-1010");
}
