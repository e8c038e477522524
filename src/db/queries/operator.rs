//! Operator lookup queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::contains_pattern;
use crate::types::{EntityRef, OperatorStatus};

/// Find approved, active operators whose name contains `name` (case-insensitive)
pub async fn find_active_operators_by_name(
    pool: &PgPool,
    company_id: Uuid,
    name: &str,
    limit: i64,
) -> Result<Vec<EntityRef>> {
    let operators = sqlx::query_as::<_, EntityRef>(
        r#"
        SELECT id, name FROM operators
        WHERE company_id = $1
          AND name ILIKE $2
          AND status = $3
          AND is_active = TRUE
        ORDER BY name
        LIMIT $4
        "#,
    )
    .bind(company_id)
    .bind(contains_pattern(name))
    .bind(OperatorStatus::Approved.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(operators)
}
