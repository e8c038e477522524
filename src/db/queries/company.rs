//! Company (tenant) queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Find the company owned by a user
pub async fn find_company_for_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Uuid>> {
    let company_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM companies
        WHERE owner_id = $1
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(company_id)
}
