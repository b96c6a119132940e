use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{PgStore, RoleStore, StoreError};
use crate::models::{NewRoleAssignment, Role, RoleAssignment};

#[derive(sqlx::FromRow)]
struct RoleAssignmentRow {
    id: Uuid,
    account_id: Uuid,
    role: String,
    assigned_by: Option<Uuid>,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<RoleAssignmentRow> for RoleAssignment {
    type Error = StoreError;

    fn try_from(row: RoleAssignmentRow) -> Result<Self, Self::Error> {
        Ok(RoleAssignment {
            id: row.id,
            account_id: row.account_id,
            role: row.role.parse()?,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn insert_assignment(
        &self,
        new: NewRoleAssignment,
    ) -> Result<RoleAssignment, StoreError> {
        sqlx::query_as::<_, RoleAssignmentRow>(
            "INSERT INTO role_assignments (id, account_id, role, assigned_by, assigned_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(new.account_id)
        .bind(new.role.as_str())
        .bind(new.assigned_by)
        .bind(new.assigned_at)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn assignments_for(&self, account_id: Uuid) -> Result<Vec<RoleAssignment>, StoreError> {
        sqlx::query_as::<_, RoleAssignmentRow>(
            "SELECT * FROM role_assignments WHERE account_id = $1 ORDER BY assigned_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(RoleAssignment::try_from)
        .collect()
    }

    async fn list_assignments(&self) -> Result<Vec<RoleAssignment>, StoreError> {
        sqlx::query_as::<_, RoleAssignmentRow>(
            "SELECT * FROM role_assignments ORDER BY assigned_at DESC",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(RoleAssignment::try_from)
        .collect()
    }

    async fn replace_assignment(
        &self,
        id: Uuid,
        role: Role,
        assigned_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<RoleAssignment, StoreError> {
        sqlx::query_as::<_, RoleAssignmentRow>(
            "UPDATE role_assignments
             SET role = $2, assigned_by = $3, assigned_at = now(), expires_at = $4
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role.as_str())
        .bind(assigned_by)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }
}
