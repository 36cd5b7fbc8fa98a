//! Capability checking for inventory-service.
//!
//! By default the service runs behind a trusted gateway that has already
//! authorized the operator; the checker then only carries the auth context
//! through from headers. When an auth endpoint is configured, write
//! operations validate the bearer token and the required capability against
//! it before touching the database.

use async_trait::async_trait;
use axum::http::HeaderMap;
use backoffice_core::error::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Inventory service capabilities.
pub mod capabilities {
    /// Create purchase invoices (run reconciliation).
    pub const PURCHASE_INVOICE_CREATE: &str = "inventory.purchase_invoice:create";

    /// Delete purchase invoices and their items.
    pub const PURCHASE_INVOICE_DELETE: &str = "inventory.purchase_invoice:delete";

    /// Manage products.
    pub const PRODUCT_WRITE: &str = "inventory.product:write";

    /// Manage catalog reference data (categories, providers, branches, units).
    pub const CATALOG_WRITE: &str = "inventory.catalog:write";
}

/// Authenticated operator identity attached to a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

/// Authorization collaborator injected into the handlers at startup.
#[async_trait]
pub trait CapabilityChecker: Send + Sync {
    /// Grant or refuse the capability for this request, returning the
    /// operator's identity on success.
    async fn require_capability(
        &self,
        headers: &HeaderMap,
        capability: &str,
    ) -> Result<AuthContext, AppError>;
}

/// Gateway trust model: the upstream admin UI has already authorized the
/// operator; derive the context from its headers and allow everything.
pub struct TrustedGatewayChecker;

#[async_trait]
impl CapabilityChecker for TrustedGatewayChecker {
    async fn require_capability(
        &self,
        headers: &HeaderMap,
        _capability: &str,
    ) -> Result<AuthContext, AppError> {
        Ok(auth_context_from_headers(headers))
    }
}

/// Capability enforcement against a remote auth service.
pub struct RemoteCapabilityChecker {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    token: &'a str,
    capability: &'a str,
}

#[derive(Deserialize)]
struct CheckResponse {
    allowed: bool,
    #[serde(default)]
    user_id: String,
}

impl RemoteCapabilityChecker {
    pub fn new(endpoint: &str) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        tracing::info!(
            auth_endpoint = endpoint,
            "Capability enforcement enabled via auth service"
        );

        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CapabilityChecker for RemoteCapabilityChecker {
    async fn require_capability(
        &self,
        headers: &HeaderMap,
        capability: &str,
    ) -> Result<AuthContext, AppError> {
        let token = extract_bearer_token(headers)?;

        let response = self
            .http
            .post(format!("{}/authz/check", self.endpoint))
            .json(&CheckRequest {
                token: &token,
                capability,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to check capability: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid or expired token"
            )));
        }

        let check: CheckResponse = response.json().await.map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Malformed capability response: {}", e))
        })?;

        if !check.allowed {
            tracing::warn!(
                user_id = %check.user_id,
                capability = capability,
                "Permission denied: missing capability"
            );
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Missing capability: {}",
                capability
            )));
        }

        Ok(AuthContext {
            user_id: check.user_id,
        })
    }
}

/// Build the checker the configuration asks for: remote enforcement when an
/// endpoint is configured, gateway trust otherwise.
pub fn capability_checker_from_endpoint(endpoint: &str) -> Arc<dyn CapabilityChecker> {
    if endpoint.is_empty() {
        tracing::info!("Capability enforcement disabled (trusted gateway)");
        Arc::new(TrustedGatewayChecker)
    } else {
        Arc::new(RemoteCapabilityChecker::new(endpoint))
    }
}

/// Extract a bearer token from the authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("authorization")
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing authorization header")))?
        .to_str()
        .map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Invalid authorization header encoding"))
        })?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid Bearer token format")))
}

fn auth_context_from_headers(headers: &HeaderMap) -> AuthContext {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("system")
        .to_string();

    AuthContext { user_id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trusted_gateway_allows_everything() {
        let checker = TrustedGatewayChecker;
        let headers = HeaderMap::new();
        let result = checker
            .require_capability(&headers, capabilities::PURCHASE_INVOICE_CREATE)
            .await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().user_id, "system");
    }

    #[tokio::test]
    async fn trusted_gateway_carries_user_id_through() {
        let checker = TrustedGatewayChecker;
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "operator-17".parse().unwrap());

        let context = checker
            .require_capability(&headers, capabilities::PRODUCT_WRITE)
            .await
            .unwrap();
        assert_eq!(context.user_id, "operator-17");
    }

    #[test]
    fn bearer_token_missing_header() {
        let headers = HeaderMap::new();
        let result = extract_bearer_token(&headers);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc123".parse().unwrap());
        let result = extract_bearer_token(&headers);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn bearer_token_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer tok-123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "tok-123");
    }
}
