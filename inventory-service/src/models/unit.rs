//! Unit-of-measure model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Name of the unit assigned to products whose creator supplies none.
/// Product creators must ensure it exists explicitly; nothing creates it
/// as a side effect.
pub const DEFAULT_UNIT_NAME: &str = "piece";

/// Abbreviation stored alongside [`DEFAULT_UNIT_NAME`].
pub const DEFAULT_UNIT_ABBREVIATION: &str = "pc";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unit {
    pub unit_id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a unit.
#[derive(Debug, Clone)]
pub struct CreateUnit {
    pub name: String,
    pub abbreviation: Option<String>,
}
