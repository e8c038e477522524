//! Customer lookup queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::contains_pattern;
use crate::types::EntityRef;

/// Find customer by exact code within a company
pub async fn find_customer_by_code(
    pool: &PgPool,
    company_id: Uuid,
    code: &str,
) -> Result<Option<EntityRef>> {
    let customer = sqlx::query_as::<_, EntityRef>(
        r#"
        SELECT id, name FROM customers
        WHERE company_id = $1 AND code = $2
        "#,
    )
    .bind(company_id)
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(customer)
}

/// Find customers whose name contains `name` (case-insensitive) within a company
pub async fn find_customers_by_name(
    pool: &PgPool,
    company_id: Uuid,
    name: &str,
    limit: i64,
) -> Result<Vec<EntityRef>> {
    let customers = sqlx::query_as::<_, EntityRef>(
        r#"
        SELECT id, name FROM customers
        WHERE company_id = $1 AND name ILIKE $2
        ORDER BY name
        LIMIT $3
        "#,
    )
    .bind(company_id)
    .bind(contains_pattern(name))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(customers)
}
