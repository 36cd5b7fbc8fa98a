//! Common test utilities for inventory-service integration tests.

use backoffice_core::config::Config as CommonConfig;
use inventory_service::config::{AuthConfig, DatabaseConfig, InventoryConfig};
use inventory_service::startup::Application;
use serde_json::{json, Value};
use std::sync::Once;
use std::time::Duration;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,inventory_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Spawn a test application. Returns None when TEST_DATABASE_URL is not set,
/// letting the suite pass on machines without a Postgres instance.
pub async fn try_spawn_app() -> Option<TestApp> {
    init_tracing();

    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping integration test");
        return None;
    };

    let config = InventoryConfig {
        common: CommonConfig { port: 0 },
        service_name: "inventory-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
        auth: AuthConfig {
            // Empty = trusted gateway, no capability enforcement
            auth_service_endpoint: String::new(),
        },
    };

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());

    // Start the application in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();

    // Wait for the server to be ready with retry
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(_) => break,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Failed to reach test app after 20 attempts: {}", e),
        }
    }

    Some(TestApp { address, client })
}

#[allow(dead_code)]
impl TestApp {
    /// Create a provider with a unique name and return its id.
    pub async fn create_provider(&self) -> Uuid {
        let response = self
            .client
            .post(format!("{}/providers", self.address))
            .json(&json!({ "name": format!("Provider {}", Uuid::new_v4()) }))
            .send()
            .await
            .expect("create provider request failed");
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.expect("provider body");
        body["provider_id"]
            .as_str()
            .expect("provider_id")
            .parse()
            .expect("provider_id uuid")
    }

    /// Create a branch with a unique name and return its id.
    pub async fn create_branch(&self) -> Uuid {
        let response = self
            .client
            .post(format!("{}/branches", self.address))
            .json(&json!({ "name": format!("Branch {}", Uuid::new_v4()) }))
            .send()
            .await
            .expect("create branch request failed");
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.expect("branch body");
        body["branch_id"]
            .as_str()
            .expect("branch_id")
            .parse()
            .expect("branch_id uuid")
    }

    /// Create a product and return its body.
    pub async fn create_product(&self, body: Value) -> Value {
        let response = self
            .client
            .post(format!("{}/products", self.address))
            .json(&body)
            .send()
            .await
            .expect("create product request failed");
        assert_eq!(response.status(), 201);
        response.json().await.expect("product body")
    }

    /// Fetch a product by id.
    pub async fn get_product(&self, product_id: &str) -> Value {
        let response = self
            .client
            .get(format!("{}/products/{}", self.address, product_id))
            .send()
            .await
            .expect("get product request failed");
        assert_eq!(response.status(), 200);
        response.json().await.expect("product body")
    }

    /// Submit a purchase invoice for reconciliation, returning the raw response.
    pub async fn reconcile(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/purchase-invoices", self.address))
            .json(&body)
            .send()
            .await
            .expect("reconcile request failed")
    }
}

/// Parse a JSON decimal field (serialized as a string) for comparison.
#[allow(dead_code)]
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {}", value))
        .parse()
        .expect("decimal parse")
}
