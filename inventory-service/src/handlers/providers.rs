//! Provider handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::categories::ListQuery;
use crate::models::{CreateProvider, Provider, UpdateProvider};
use crate::services::capabilities;
use crate::startup::AppState;
use backoffice_core::error::AppError;

/// Request to create a provider.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProviderRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Request to update a provider.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProviderRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub active: Option<bool>,
}

/// Create a new provider.
///
/// POST /providers
pub async fn create_provider(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<Provider>), AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;
    req.validate()?;

    let provider = state
        .db
        .create_provider(&CreateProvider {
            name: req.name,
            contact_name: req.contact_name,
            phone: req.phone,
            email: req.email,
            address: req.address,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(provider)))
}

/// Get a provider by ID.
///
/// GET /providers/:provider_id
pub async fn get_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Provider>, AppError> {
    let provider = state
        .db
        .get_provider(provider_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Provider not found")))?;

    Ok(Json(provider))
}

/// List providers.
///
/// GET /providers
pub async fn list_providers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Provider>>, AppError> {
    let providers = state
        .db
        .list_providers(query.active_only, query.page_size(), query.page_token)
        .await?;

    Ok(Json(providers))
}

/// Update a provider.
///
/// PATCH /providers/:provider_id
pub async fn update_provider(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider_id): Path<Uuid>,
    Json(req): Json<UpdateProviderRequest>,
) -> Result<Json<Provider>, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;
    req.validate()?;

    let provider = state
        .db
        .update_provider(
            provider_id,
            &UpdateProvider {
                name: req.name,
                contact_name: req.contact_name,
                phone: req.phone,
                email: req.email,
                address: req.address,
                active: req.active,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Provider not found")))?;

    Ok(Json(provider))
}

/// Delete a provider.
///
/// DELETE /providers/:provider_id
pub async fn delete_provider(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;

    if state.db.delete_provider(provider_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Provider not found")))
    }
}
