//! Scheduled visit types

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Scheduled visit status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
        }
    }
}

/// Visit about to be inserted by the importer
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduledVisit {
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub operator_id: Option<Uuid>,
    pub application_code: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub service_types: Vec<String>,
    pub notes: Option<String>,
    pub status: VisitStatus,
    pub created_by: Uuid,
}

/// Scheduled visit entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledVisit {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub operator_id: Option<Uuid>,
    pub application_code: String,

    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,

    pub service_types: Vec<String>,
    pub notes: Option<String>,
    pub status: String,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
