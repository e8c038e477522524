//! Branch lookup queries. Branches are always scoped to their customer.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::contains_pattern;
use crate::types::EntityRef;

/// Find branch by exact code for a customer
pub async fn find_branch_by_code(
    pool: &PgPool,
    customer_id: Uuid,
    code: &str,
) -> Result<Option<EntityRef>> {
    let branch = sqlx::query_as::<_, EntityRef>(
        r#"
        SELECT id, name FROM branches
        WHERE customer_id = $1 AND code = $2
        "#,
    )
    .bind(customer_id)
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(branch)
}

/// Find branches whose name contains `name` (case-insensitive) for a customer
pub async fn find_branches_by_name(
    pool: &PgPool,
    customer_id: Uuid,
    name: &str,
    limit: i64,
) -> Result<Vec<EntityRef>> {
    let branches = sqlx::query_as::<_, EntityRef>(
        r#"
        SELECT id, name FROM branches
        WHERE customer_id = $1 AND name ILIKE $2
        ORDER BY name
        LIMIT $3
        "#,
    )
    .bind(customer_id)
    .bind(contains_pattern(name))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(branches)
}
