//! Purchase-invoice handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{ListInvoicesFilter, PurchaseInvoice, PurchaseInvoiceItem};
use crate::services::capabilities;
use crate::services::reconciliation::{LineItemInput, ReconcileInvoice};
use crate::startup::AppState;
use backoffice_core::error::AppError;

/// Request to reconcile a submitted purchase invoice.
#[derive(Debug, Deserialize, Validate)]
pub struct ReconcileInvoiceRequest {
    pub provider_id: Uuid,
    pub branch_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub notes: Option<String>,
    pub image_path: Option<String>,
    pub items: Vec<LineItemInput>,
}

/// Invoice with its line items.
#[derive(Debug, Serialize)]
pub struct PurchaseInvoiceResponse {
    #[serde(flatten)]
    pub invoice: PurchaseInvoice,
    pub items: Vec<PurchaseInvoiceItem>,
}

/// List query parameters for purchase invoices.
#[derive(Debug, Deserialize, Default)]
pub struct ListInvoicesQuery {
    pub provider_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Reconcile a purchase invoice: one atomic run producing the invoice, its
/// items, any product creations/updates, price history, and stock.
///
/// POST /purchase-invoices
pub async fn create_purchase_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReconcileInvoiceRequest>,
) -> Result<(StatusCode, Json<PurchaseInvoiceResponse>), AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::PURCHASE_INVOICE_CREATE)
        .await?;
    req.validate()?;

    let (invoice, items) = state
        .db
        .reconcile_purchase_invoice(&ReconcileInvoice {
            provider_id: req.provider_id,
            branch_id: req.branch_id,
            invoice_number: req.invoice_number,
            invoice_date: req.invoice_date,
            notes: req.notes,
            image_path: req.image_path,
            items: req.items,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseInvoiceResponse { invoice, items }),
    ))
}

/// Get a purchase invoice with its items.
///
/// GET /purchase-invoices/:invoice_id
pub async fn get_purchase_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<PurchaseInvoiceResponse>, AppError> {
    let invoice = state
        .db
        .get_purchase_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Purchase invoice not found")))?;

    let items = state.db.get_invoice_items(invoice_id).await?;

    Ok(Json(PurchaseInvoiceResponse { invoice, items }))
}

/// List purchase invoices.
///
/// GET /purchase-invoices
pub async fn list_purchase_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<PurchaseInvoice>>, AppError> {
    let invoices = state
        .db
        .list_purchase_invoices(&ListInvoicesFilter {
            provider_id: query.provider_id,
            branch_id: query.branch_id,
            start_date: query.start_date,
            end_date: query.end_date,
            page_size: query.page_size.unwrap_or(50),
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(invoices))
}

/// Delete a purchase invoice, returning the stock of every item.
///
/// DELETE /purchase-invoices/:invoice_id
pub async fn delete_purchase_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::PURCHASE_INVOICE_DELETE)
        .await?;

    if state.db.delete_purchase_invoice(invoice_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Purchase invoice not found"
        )))
    }
}

/// Delete one invoice item, returning its stock.
///
/// DELETE /purchase-invoices/:invoice_id/items/:item_id
pub async fn delete_invoice_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((invoice_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .authz
        .require_capability(&headers, capabilities::PURCHASE_INVOICE_DELETE)
        .await?;

    if state.db.delete_invoice_item(invoice_id, item_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Invoice item not found"
        )))
    }
}
