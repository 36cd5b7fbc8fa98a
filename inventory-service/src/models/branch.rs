//! Branch (store location) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub branch_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a branch.
#[derive(Debug, Clone)]
pub struct CreateBranch {
    pub name: String,
    pub address: Option<String>,
}

/// Input for updating a branch.
#[derive(Debug, Clone, Default)]
pub struct UpdateBranch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub active: Option<bool>,
}
