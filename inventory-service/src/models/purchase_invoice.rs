//! Purchase invoice and line-item models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseInvoice {
    pub invoice_id: Uuid,
    pub provider_id: Uuid,
    pub branch_id: Uuid,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    /// Recomputed once after all items are persisted, never a live aggregate.
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub image_path: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Line item on a purchase invoice. Created by reconciliation and never
/// mutated afterward; `product_id` goes NULL if the product is hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseInvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,
    pub quantity: i32,
    /// Always the submitted unit price, bonus items included.
    pub purchase_price: Decimal,
    pub sell_price: Decimal,
    pub is_bonus: bool,
    pub created_utc: DateTime<Utc>,
}

/// Filter parameters for listing purchase invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub provider_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
