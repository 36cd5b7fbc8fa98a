//! Product model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Low-stock threshold applied to products created without one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub category_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub name: String,
    pub barcode: Option<String>,
    pub purchase_price: Decimal,
    pub sell_price: Decimal,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub category_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub name: String,
    pub barcode: Option<String>,
    pub purchase_price: Decimal,
    pub sell_price: Decimal,
    pub stock: i32,
    pub low_stock_threshold: i32,
}

/// Input for updating a product.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub category_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub sell_price: Option<Decimal>,
    pub low_stock_threshold: Option<i32>,
    pub active: Option<bool>,
}

/// Filter parameters for listing products.
#[derive(Debug, Clone, Default)]
pub struct ListProductsFilter {
    pub category_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub barcode: Option<String>,
    pub active_only: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32, threshold: i32) -> Product {
        Product {
            product_id: Uuid::new_v4(),
            category_id: None,
            provider_id: None,
            unit_id: None,
            name: "Widget".to_string(),
            barcode: None,
            purchase_price: Decimal::new(200, 2),
            sell_price: Decimal::new(300, 2),
            stock,
            low_stock_threshold: threshold,
            active: true,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn stock_at_threshold_is_low() {
        assert!(product(5, 5).is_low_stock());
    }

    #[test]
    fn stock_above_threshold_is_not_low() {
        assert!(!product(6, 5).is_low_stock());
    }
}
