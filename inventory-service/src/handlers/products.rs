//! Product handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CreateProduct, ListProductsFilter, PriceHistory, Product, UpdateProduct,
    DEFAULT_LOW_STOCK_THRESHOLD,
};
use crate::services::capabilities;
use crate::startup::AppState;
use backoffice_core::error::AppError;

/// Request to create a product.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    /// When absent, the default unit is ensured and assigned.
    pub unit_id: Option<Uuid>,
    pub purchase_price: Decimal,
    pub sell_price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    pub low_stock_threshold: Option<i32>,
}

/// Request to update a product.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub purchase_price: Option<Decimal>,
    pub sell_price: Option<Decimal>,
    pub low_stock_threshold: Option<i32>,
    pub active: Option<bool>,
}

/// List query parameters for products.
#[derive(Debug, Deserialize, Default)]
pub struct ListProductsQuery {
    pub category_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub barcode: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Query parameters for price-history listing.
#[derive(Debug, Deserialize, Default)]
pub struct PriceHistoryQuery {
    pub page_size: Option<i32>,
}

/// Create a new product.
///
/// POST /products
pub async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::PRODUCT_WRITE)
        .await?;
    req.validate()?;

    // The default unit is assigned here, by the creator, not by a hidden
    // hook on the model.
    let unit_id = match req.unit_id {
        Some(unit_id) => Some(unit_id),
        None => Some(state.db.ensure_default_unit().await?.unit_id),
    };

    let product = state
        .db
        .create_product(&CreateProduct {
            category_id: req.category_id,
            provider_id: req.provider_id,
            unit_id,
            name: req.name,
            barcode: req.barcode,
            purchase_price: req.purchase_price,
            sell_price: req.sell_price,
            stock: req.stock,
            low_stock_threshold: req.low_stock_threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product by ID.
///
/// GET /products/:product_id
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

/// List products.
///
/// GET /products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = state
        .db
        .list_products(&ListProductsFilter {
            category_id: query.category_id,
            provider_id: query.provider_id,
            barcode: query.barcode,
            active_only: query.active_only,
            page_size: query.page_size.unwrap_or(50),
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(products))
}

/// Update a product.
///
/// PATCH /products/:product_id
pub async fn update_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::PRODUCT_WRITE)
        .await?;
    req.validate()?;

    let product = state
        .db
        .update_product(
            product_id,
            &UpdateProduct {
                category_id: req.category_id,
                provider_id: req.provider_id,
                unit_id: req.unit_id,
                name: req.name,
                barcode: req.barcode,
                purchase_price: req.purchase_price,
                sell_price: req.sell_price,
                low_stock_threshold: req.low_stock_threshold,
                active: req.active,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

/// Hard-delete a product.
///
/// DELETE /products/:product_id
pub async fn delete_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::PRODUCT_WRITE)
        .await?;

    if state.db.delete_product(product_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Product not found")))
    }
}

/// List a product's price history, newest first.
///
/// GET /products/:product_id/price-history
pub async fn list_price_history(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<PriceHistoryQuery>,
) -> Result<Json<Vec<PriceHistory>>, AppError> {
    state
        .db
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    let history = state
        .db
        .list_price_history(product_id, query.page_size.unwrap_or(50))
        .await?;

    Ok(Json(history))
}
