//! Record store abstraction for the import pipeline.
//!
//! `RecordStore` is the seam between the importer and the backend. `PgRecordStore`
//! is the production implementation over `db::queries`; tests use
//! `InMemoryRecordStore`, which also counts calls so tests can assert that no
//! store access happened.
//!
//! Every lookup takes an explicit company or customer scope.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::queries;
use crate::types::{EntityRef, NewScheduledVisit};

/// Postgres SQLSTATE for unique constraint violations
pub const UNIQUE_VIOLATION: &str = "23505";

/// Unique constraint on `scheduled_visits.application_code`
pub const APPLICATION_CODE_CONSTRAINT: &str = "scheduled_visits_application_code_key";

/// Code used when the store could not be reached or answered without a SQLSTATE
pub const TRANSPORT_ERROR: &str = "TRANSPORT";

/// Failure reported by the record store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct StoreError {
    pub code: String,
    pub message: String,
    /// Violated constraint name, when the backend reports one
    pub constraint: Option<String>,
}

impl StoreError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            constraint: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_ERROR, message)
    }

    pub fn unique_violation(constraint: &str, message: impl Into<String>) -> Self {
        Self {
            code: UNIQUE_VIOLATION.to_string(),
            message: message.into(),
            constraint: Some(constraint.to_string()),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code == UNIQUE_VIOLATION
    }

    /// Whether this is a unique violation on the given constraint
    pub fn violates(&self, constraint: &str) -> bool {
        self.is_unique_violation() && self.constraint.as_deref() == Some(constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => Self {
                code: db
                    .code()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|| "DATABASE".to_string()),
                message: db.message().to_string(),
                constraint: db.constraint().map(str::to_string),
            },
            _ => Self::transport(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => sqlx_err.into(),
            Err(other) => Self::transport(other.to_string()),
        }
    }
}

/// Backend store queried by the import pipeline
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Company (tenant) owned by the user, if any
    async fn company_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    async fn find_customer_by_code(&self, company_id: Uuid, code: &str) -> Result<Option<EntityRef>, StoreError>;

    /// Case-insensitive partial name match, at most `limit` rows
    async fn find_customers_by_name(&self, company_id: Uuid, name: &str, limit: i64) -> Result<Vec<EntityRef>, StoreError>;

    async fn find_branch_by_code(&self, customer_id: Uuid, code: &str) -> Result<Option<EntityRef>, StoreError>;

    async fn find_branches_by_name(&self, customer_id: Uuid, name: &str, limit: i64) -> Result<Vec<EntityRef>, StoreError>;

    /// Approved and active operators only
    async fn find_active_operators_by_name(&self, company_id: Uuid, name: &str, limit: i64) -> Result<Vec<EntityRef>, StoreError>;

    /// Insert a visit, returning its id
    async fn insert_scheduled_visit(&self, visit: &NewScheduledVisit) -> Result<Uuid, StoreError>;
}

// =============================================================================
// PgRecordStore — PostgreSQL via sqlx
// =============================================================================

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn company_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(queries::company::find_company_for_user(&self.pool, user_id).await?)
    }

    async fn find_customer_by_code(&self, company_id: Uuid, code: &str) -> Result<Option<EntityRef>, StoreError> {
        Ok(queries::customer::find_customer_by_code(&self.pool, company_id, code).await?)
    }

    async fn find_customers_by_name(&self, company_id: Uuid, name: &str, limit: i64) -> Result<Vec<EntityRef>, StoreError> {
        Ok(queries::customer::find_customers_by_name(&self.pool, company_id, name, limit).await?)
    }

    async fn find_branch_by_code(&self, customer_id: Uuid, code: &str) -> Result<Option<EntityRef>, StoreError> {
        Ok(queries::branch::find_branch_by_code(&self.pool, customer_id, code).await?)
    }

    async fn find_branches_by_name(&self, customer_id: Uuid, name: &str, limit: i64) -> Result<Vec<EntityRef>, StoreError> {
        Ok(queries::branch::find_branches_by_name(&self.pool, customer_id, name, limit).await?)
    }

    async fn find_active_operators_by_name(&self, company_id: Uuid, name: &str, limit: i64) -> Result<Vec<EntityRef>, StoreError> {
        Ok(queries::operator::find_active_operators_by_name(&self.pool, company_id, name, limit).await?)
    }

    async fn insert_scheduled_visit(&self, visit: &NewScheduledVisit) -> Result<Uuid, StoreError> {
        let created = queries::visit::create_scheduled_visit(&self.pool, visit).await?;
        Ok(created.id)
    }
}

// =============================================================================
// InMemoryRecordStore — tests
// =============================================================================

#[cfg(test)]
pub use memory::InMemoryRecordStore;
