//! Price-history model: an append-only audit trail of product price changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceHistory {
    pub history_id: Uuid,
    pub product_id: Uuid,
    pub old_purchase_price: Decimal,
    pub old_sell_price: Decimal,
    pub new_purchase_price: Decimal,
    pub new_sell_price: Decimal,
    pub change_reason: String,
    pub note: Option<String>,
    pub changed_utc: DateTime<Utc>,
}
