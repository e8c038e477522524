//! Registry lookup types (customers, branches, operators)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registry record matched by a lookup: just its id and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: Uuid,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Operator approval status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperatorStatus {
    Pending,
    Approved,
    Rejected,
}

impl OperatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}
