//! Prometheus metrics for inventory-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Counter, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "inventory_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Reconciled purchase invoices.
pub static PURCHASE_INVOICES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "inventory_purchase_invoices_total",
        "Total number of reconciled purchase invoices"
    )
    .expect("Failed to register purchase_invoices_total")
});

/// Monetary total of reconciled purchase invoices.
pub static INVOICE_AMOUNT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "inventory_invoice_amount_total",
        "Total reconciled purchase invoice amount"
    )
    .expect("Failed to register invoice_amount_total")
});

/// Products created, labelled by which flow created them.
pub static PRODUCTS_CREATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "inventory_products_created_total",
        "Total number of products created",
        &["source"] // api, reconciliation
    )
    .expect("Failed to register products_created_total")
});

/// Price changes recorded in the price history.
pub static PRICE_CHANGES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "inventory_price_changes_total",
        "Total number of recorded product price changes"
    )
    .expect("Failed to register price_changes_total")
});

/// Stock decrements skipped because the product was already gone.
pub static STOCK_DECREMENTS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "inventory_stock_decrements_skipped_total",
        "Item deletions whose stock decrement found no product"
    )
    .expect("Failed to register stock_decrements_skipped_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&PURCHASE_INVOICES_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&PRODUCTS_CREATED_TOTAL);
    Lazy::force(&PRICE_CHANGES_TOTAL);
    Lazy::force(&STOCK_DECREMENTS_SKIPPED_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
