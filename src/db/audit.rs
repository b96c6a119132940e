use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{AuditStore, PgStore, StoreError};
use crate::models::{
    ActivityLogEntry, ActivityQuery, LoginHistoryEntry, LoginQuery, NewActivity, NewLogin,
};

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    actor_id: Option<Uuid>,
    action: String,
    entity_type: String,
    entity_id: Option<Uuid>,
    details: sqlx::types::Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityLogEntry {
    fn from(row: ActivityRow) -> Self {
        ActivityLogEntry {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: row.details.0,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: Uuid,
    account_id: Option<Uuid>,
    email: String,
    success: bool,
    failure_reason: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<LoginRow> for LoginHistoryEntry {
    fn from(row: LoginRow) -> Self {
        LoginHistoryEntry {
            id: row.id,
            account_id: row.account_id,
            email: row.email,
            success: row.success,
            failure_reason: row.failure_reason,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError> {
        let row = sqlx::query_as::<_, ActivityRow>(
            "INSERT INTO activity_log (id, actor_id, action, entity_type, entity_id, details)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(sqlx::types::Json(&entry.details))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn append_login(&self, entry: NewLogin) -> Result<LoginHistoryEntry, StoreError> {
        let row = sqlx::query_as::<_, LoginRow>(
            "INSERT INTO login_history
                (id, account_id, email, success, failure_reason, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(entry.account_id)
        .bind(&entry.email)
        .bind(entry.success)
        .bind(entry.failure_reason())
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_activity(
        &self,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT * FROM activity_log
             WHERE ($1::timestamptz IS NULL OR created_at >= $1)
               AND ($2::uuid IS NULL OR actor_id = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3",
        )
        .bind(query.since)
        .bind(query.actor_id)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_logins(&self, query: &LoginQuery) -> Result<Vec<LoginHistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LoginRow>(
            "SELECT * FROM login_history
             WHERE ($1::timestamptz IS NULL OR created_at >= $1)
               AND ($2::uuid IS NULL OR account_id = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3",
        )
        .bind(query.since)
        .bind(query.account_id)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
