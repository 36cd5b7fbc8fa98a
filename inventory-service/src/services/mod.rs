//! Services for inventory-service.

pub mod capability;
pub mod database;
pub mod metrics;
pub mod reconciliation;

pub use capability::{
    capabilities, capability_checker_from_endpoint, AuthContext, CapabilityChecker,
    RemoteCapabilityChecker, TrustedGatewayChecker,
};
pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use reconciliation::{LineItemInput, ReconcileInvoice};
