//! Category handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Category, CreateCategory, UpdateCategory};
use crate::services::capabilities;
use crate::startup::AppState;
use backoffice_core::error::AppError;

/// Request to create a category.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
}

/// Request to update a category.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// List query parameters shared by the catalog listings.
#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub active_only: bool,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

impl ListQuery {
    pub fn page_size(&self) -> i32 {
        self.page_size.unwrap_or(50)
    }
}

/// Create a new category.
///
/// POST /categories
pub async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;
    req.validate()?;

    let category = state
        .db
        .create_category(&CreateCategory {
            name: req.name,
            description: req.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Get a category by ID.
///
/// GET /categories/:category_id
pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    let category = state
        .db
        .get_category(category_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Category not found")))?;

    Ok(Json(category))
}

/// List categories.
///
/// GET /categories
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state
        .db
        .list_categories(query.active_only, query.page_size(), query.page_token)
        .await?;

    Ok(Json(categories))
}

/// Update a category.
///
/// PATCH /categories/:category_id
pub async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category_id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;
    req.validate()?;

    let category = state
        .db
        .update_category(
            category_id,
            &UpdateCategory {
                name: req.name,
                description: req.description,
                active: req.active,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Category not found")))?;

    Ok(Json(category))
}

/// Delete a category.
///
/// DELETE /categories/:category_id
pub async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;

    if state.db.delete_category(category_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Category not found")))
    }
}
