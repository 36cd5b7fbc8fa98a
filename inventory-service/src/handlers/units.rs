//! Unit-of-measure handlers.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::models::{CreateUnit, Unit};
use crate::services::capabilities;
use crate::startup::AppState;
use backoffice_core::error::AppError;

/// Request to create a unit.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUnitRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[validate(length(min = 1, max = 12))]
    pub abbreviation: Option<String>,
}

/// Create a new unit.
///
/// POST /units
pub async fn create_unit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateUnitRequest>,
) -> Result<(StatusCode, Json<Unit>), AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::CATALOG_WRITE)
        .await?;
    req.validate()?;

    let unit = state
        .db
        .create_unit(&CreateUnit {
            name: req.name,
            abbreviation: req.abbreviation,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(unit)))
}

/// List units.
///
/// GET /units
pub async fn list_units(State(state): State<AppState>) -> Result<Json<Vec<Unit>>, AppError> {
    let units = state.db.list_units().await?;
    Ok(Json(units))
}
