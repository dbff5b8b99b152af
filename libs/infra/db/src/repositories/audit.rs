use creditcore_domain_models::AuditLog;
use sqlx::postgres::PgPool;
use tracing::instrument;

use crate::errors::DbError;

pub struct AuditRepository {
    pool: PgPool,
}

#[derive(Debug, Clone, Default)]
pub struct AuditEntry<'a> {
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub user_id: Option<i64>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, entry))]
    pub async fn record(&self, entry: AuditEntry<'_>) -> Result<AuditLog, DbError> {
        let row = sqlx::query_as::<_, AuditLog>(
            r#"
            insert into audit_log (action, entity_type, entity_id, user_id, old_value, new_value, metadata)
            values ($1, $2, $3, $4, $5, $6, $7)
            returning *
            "#,
        )
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.user_id)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditLog>, DbError> {
        let rows = sqlx::query_as::<_, AuditLog>(
            "select * from audit_log where entity_type = $1 and entity_id = $2 order by created_at desc",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
