use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{AccountStore, PgStore, StoreError};
use crate::models::{Account, AccountFilter, AccountStatus, ProfileUpdate, ProfileUpsert};

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    full_name: String,
    company_name: Option<String>,
    phone: Option<String>,
    department: Option<String>,
    notes: Option<String>,
    status: String,
    created_by: Option<Uuid>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            company_name: row.company_name,
            phone: row.phone,
            department: row.department,
            notes: row.notes,
            status: row.status.parse()?,
            created_by: row.created_by,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn upsert_profile(&self, profile: ProfileUpsert) -> Result<Account, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "INSERT INTO accounts
                (id, email, full_name, company_name, phone, department, notes, status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                company_name = EXCLUDED.company_name,
                phone = EXCLUDED.phone,
                department = EXCLUDED.department,
                notes = EXCLUDED.notes,
                status = EXCLUDED.status,
                created_by = EXCLUDED.created_by,
                updated_at = now()
             RETURNING *",
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.company_name)
        .bind(&profile.phone)
        .bind(&profile.department)
        .bind(&profile.notes)
        .bind(profile.status.as_str())
        .bind(profile.created_by)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE lower(email) = lower($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn list(&self, filter: &AccountFilter) -> Result<Vec<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR lower(company_name) = lower($2))
             ORDER BY created_at DESC",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.company)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Account::try_from)
        .collect()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Account, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "UPDATE accounts SET
                full_name = COALESCE($2, full_name),
                company_name = COALESCE($3, company_name),
                phone = COALESCE($4, phone),
                department = COALESCE($5, department),
                notes = COALESCE($6, notes),
                updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&update.full_name)
        .bind(&update.company_name)
        .bind(&update.phone)
        .bind(&update.department)
        .bind(&update.notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }

    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<Account, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "UPDATE accounts SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
