//! Storage collaborators.
//!
//! Every durable read or write the subsystem performs goes through one of
//! these traits. Activity and login history only expose append and select:
//! there is no update or delete path for them.

pub mod accounts;
pub mod audit;
pub mod memory;
pub mod roles;
pub mod subscriptions;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Account, AccountFilter, AccountStatus, ActivityLogEntry, ActivityQuery, CompanySubscription,
    LoginHistoryEntry, LoginQuery, NewActivity, NewLogin, NewRoleAssignment, ParseEnumError,
    ProfileUpdate, ProfileUpsert, Role, RoleAssignment,
};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create the profile row for `profile.id`, or overwrite it if one exists.
    async fn upsert_profile(&self, profile: ProfileUpsert) -> Result<Account, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    /// Newest first.
    async fn list(&self, filter: &AccountFilter) -> Result<Vec<Account>, StoreError>;
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate)
    -> Result<Account, StoreError>;
    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<Account, StoreError>;
    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the account already holds an assignment.
    async fn insert_assignment(
        &self,
        new: NewRoleAssignment,
    ) -> Result<RoleAssignment, StoreError>;
    async fn assignments_for(&self, account_id: Uuid) -> Result<Vec<RoleAssignment>, StoreError>;
    async fn list_assignments(&self) -> Result<Vec<RoleAssignment>, StoreError>;
    async fn replace_assignment(
        &self,
        id: Uuid,
        role: Role,
        assigned_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<RoleAssignment, StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError>;
    async fn append_login(&self, entry: NewLogin) -> Result<LoginHistoryEntry, StoreError>;
    /// Newest first, capped at `query.limit`.
    async fn list_activity(&self, query: &ActivityQuery)
    -> Result<Vec<ActivityLogEntry>, StoreError>;
    /// Newest first, capped at `query.limit`.
    async fn list_logins(&self, query: &LoginQuery) -> Result<Vec<LoginHistoryEntry>, StoreError>;
}

/// Read-only view of the billing system's per-company subscription state.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn list_subscriptions(&self) -> Result<Vec<CompanySubscription>, StoreError>;
}

/// Postgres-backed implementation of every storage trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
