//! Scheduled visit database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{NewScheduledVisit, ScheduledVisit};

/// Insert a scheduled visit
pub async fn create_scheduled_visit(pool: &PgPool, visit: &NewScheduledVisit) -> Result<ScheduledVisit> {
    let created = sqlx::query_as::<_, ScheduledVisit>(
        r#"
        INSERT INTO scheduled_visits (
            id, company_id, customer_id, branch_id, operator_id,
            application_code, scheduled_date, scheduled_time,
            service_types, notes, status, created_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
        RETURNING
            id, company_id, customer_id, branch_id, operator_id,
            application_code, scheduled_date, scheduled_time,
            service_types, notes, status, created_by, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(visit.company_id)
    .bind(visit.customer_id)
    .bind(visit.branch_id)
    .bind(visit.operator_id)
    .bind(&visit.application_code)
    .bind(visit.scheduled_date)
    .bind(visit.scheduled_time)
    .bind(&visit.service_types)
    .bind(&visit.notes)
    .bind(visit.status.as_str())
    .bind(visit.created_by)
    .fetch_one(pool)
    .await?;

    Ok(created)
}
