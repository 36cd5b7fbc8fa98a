//! Purchase-invoice reconciliation primitives.
//!
//! The submission types and the pure rules of the procedure live here:
//! boundary validation, product identification, bonus-cost computation,
//! price-change detection, and total accumulation. The transactional
//! execution against Postgres is `Database::reconcile_purchase_invoice`.

use backoffice_core::error::AppError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Product;

/// Reason tag recorded on price-history rows written during reconciliation.
pub const PRICE_CHANGE_REASON_INVOICE: &str = "invoice_update";

/// One submitted invoice line. A line identifies its product by id, by
/// barcode, or — when neither matches anything — by carrying a name for the
/// product the reconciliation will create.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub product_id: Option<Uuid>,
    pub barcode: Option<String>,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub sell_price: Decimal,
    #[serde(default)]
    pub is_bonus: bool,
}

impl LineItemInput {
    /// Barcode with whitespace-only and empty submissions treated as absent.
    pub fn barcode(&self) -> Option<&str> {
        non_empty(self.barcode.as_deref())
    }

    /// Product name, empty submissions treated as absent.
    pub fn product_name(&self) -> Option<&str> {
        non_empty(self.product_name.as_deref())
    }

    /// Whether this line can reach a product at all: an id, a barcode to
    /// look up, or a name to create one under.
    pub fn identifies_product(&self) -> bool {
        self.product_id.is_some() || self.barcode().is_some() || self.product_name().is_some()
    }

    /// Cost per unit: bonus lines contribute nothing to the invoice total.
    pub fn cost(&self) -> Decimal {
        if self.is_bonus {
            Decimal::ZERO
        } else {
            self.unit_price
        }
    }

    /// This line's contribution to the invoice total.
    pub fn line_total(&self) -> Decimal {
        self.cost() * Decimal::from(self.quantity)
    }
}

/// Full reconciliation input: header fields plus the ordered line items.
#[derive(Debug, Clone)]
pub struct ReconcileInvoice {
    pub provider_id: Uuid,
    pub branch_id: Uuid,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub notes: Option<String>,
    pub image_path: Option<String>,
    pub items: Vec<LineItemInput>,
}

/// Boundary validation, run before any persistence. Quantity must be
/// positive and every line must identify a product one way or another.
pub fn validate_line_items(items: &[LineItemInput]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "A purchase invoice needs at least one line item"
        )));
    }

    for (position, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line {}: quantity must be a positive integer, got {}",
                position + 1,
                item.quantity
            )));
        }
        if !item.identifies_product() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line {}: no product id, barcode, or product name supplied",
                position + 1
            )));
        }
    }

    Ok(())
}

/// True when the submitted prices differ from the product's stored prices,
/// i.e. when reconciliation must update the product and record history.
pub fn prices_differ(product: &Product, item: &LineItemInput) -> bool {
    product.purchase_price != item.unit_price || product.sell_price != item.sell_price
}

/// Note embedded in price-history rows written for an invoice.
pub fn price_change_note(invoice_number: &str) -> String {
    format!("Price updated by purchase invoice {}", invoice_number)
}

/// Invoice total over the submitted lines: bonus lines count zero.
pub fn invoice_total(items: &[LineItemInput]) -> Decimal {
    items.iter().map(LineItemInput::line_total).sum()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(quantity: i32, unit_price: Decimal, is_bonus: bool) -> LineItemInput {
        LineItemInput {
            product_id: None,
            barcode: None,
            product_name: Some("Widget".to_string()),
            quantity,
            unit_price,
            sell_price: Decimal::new(300, 2),
            is_bonus,
        }
    }

    fn stored_product(purchase: Decimal, sell: Decimal) -> Product {
        Product {
            product_id: Uuid::new_v4(),
            category_id: None,
            provider_id: None,
            unit_id: None,
            name: "Widget".to_string(),
            barcode: Some("12345".to_string()),
            purchase_price: purchase,
            sell_price: sell,
            stock: 10,
            low_stock_threshold: 5,
            active: true,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn empty_submission_is_rejected() {
        let result = validate_line_items(&[]);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let result = validate_line_items(&[line(0, Decimal::new(200, 2), false)]);
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let result = validate_line_items(&[line(-3, Decimal::new(200, 2), false)]);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn unidentifiable_line_is_rejected() {
        let mut item = line(1, Decimal::new(200, 2), false);
        item.product_name = None;
        assert!(matches!(
            validate_line_items(&[item]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn whitespace_barcode_and_name_count_as_absent() {
        let mut item = line(1, Decimal::new(200, 2), false);
        item.product_name = Some("   ".to_string());
        item.barcode = Some("".to_string());
        assert!(item.barcode().is_none());
        assert!(item.product_name().is_none());
        assert!(!item.identifies_product());
    }

    #[test]
    fn one_invalid_line_fails_the_whole_submission() {
        let good = line(2, Decimal::new(200, 2), false);
        let mut bad = line(1, Decimal::new(200, 2), false);
        bad.product_name = None;
        assert!(validate_line_items(&[good, bad]).is_err());
    }

    #[test]
    fn bonus_line_costs_nothing_but_keeps_its_price() {
        let item = line(2, Decimal::new(250, 2), true);
        assert_eq!(item.cost(), Decimal::ZERO);
        assert_eq!(item.line_total(), Decimal::ZERO);
        // The price itself is untouched; only cost is zeroed.
        assert_eq!(item.unit_price, Decimal::new(250, 2));
    }

    #[test]
    fn total_sums_non_bonus_lines() {
        let items = vec![
            line(5, Decimal::new(200, 2), false), // 10.00
            line(2, Decimal::new(250, 2), false), // 5.00
            line(4, Decimal::new(999, 2), true),  // bonus: 0
        ];
        assert_eq!(invoice_total(&items), Decimal::new(1500, 2));
    }

    #[test]
    fn price_change_detected_on_either_price() {
        let product = stored_product(Decimal::new(200, 2), Decimal::new(300, 2));

        let same = line(1, Decimal::new(200, 2), false);
        assert!(!prices_differ(&product, &same));

        let purchase_changed = line(1, Decimal::new(250, 2), false);
        assert!(prices_differ(&product, &purchase_changed));

        let mut sell_changed = line(1, Decimal::new(200, 2), false);
        sell_changed.sell_price = Decimal::new(350, 2);
        assert!(prices_differ(&product, &sell_changed));
    }

    #[test]
    fn price_change_note_embeds_invoice_number() {
        assert!(price_change_note("INV-0042").contains("INV-0042"));
    }
}
