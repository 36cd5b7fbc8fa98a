//! Branch handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::categories::ListQuery;
use crate::models::{Branch, CreateBranch, UpdateBranch};
use crate::services::capabilities;
use crate::startup::AppState;
use backoffice_core::error::AppError;

/// Request to create a branch.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBranchRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub address: Option<String>,
}

/// Request to update a branch.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBranchRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub active: Option<bool>,
}

/// Create a new branch.
///
/// POST /branches
pub async fn create_branch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<Branch>), AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;
    req.validate()?;

    let branch = state
        .db
        .create_branch(&CreateBranch {
            name: req.name,
            address: req.address,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(branch)))
}

/// Get a branch by ID.
///
/// GET /branches/:branch_id
pub async fn get_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Branch>, AppError> {
    let branch = state
        .db
        .get_branch(branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    Ok(Json(branch))
}

/// List branches.
///
/// GET /branches
pub async fn list_branches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Branch>>, AppError> {
    let branches = state
        .db
        .list_branches(query.active_only, query.page_size(), query.page_token)
        .await?;

    Ok(Json(branches))
}

/// Update a branch.
///
/// PATCH /branches/:branch_id
pub async fn update_branch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(branch_id): Path<Uuid>,
    Json(req): Json<UpdateBranchRequest>,
) -> Result<Json<Branch>, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;
    req.validate()?;

    let branch = state
        .db
        .update_branch(
            branch_id,
            &UpdateBranch {
                name: req.name,
                address: req.address,
                active: req.active,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    Ok(Json(branch))
}
