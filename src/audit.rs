use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::{AuditStore, StoreError};
use crate::models::{
    ActivityLogEntry, ActivityQuery, LoginHistoryEntry, LoginQuery, NewActivity, NewLogin,
};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Append-only writer and reader for activity and login history.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append an activity entry; returns once the store has accepted it.
    pub async fn record(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError> {
        self.store.append_activity(entry).await
    }

    /// Like [`record`](Self::record) but a failed write is only logged.
    pub async fn record_best_effort(&self, entry: NewActivity) -> Option<ActivityLogEntry> {
        let action = entry.action.clone();
        match self.store.append_activity(entry).await {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::error!(%action, error = %e, "Failed to record activity");
                None
            }
        }
    }

    /// Record an authentication attempt. A failed login is an ordinary event
    /// here, so this never returns an error; a failed write is logged.
    pub async fn record_login(&self, login: NewLogin) -> Option<LoginHistoryEntry> {
        let email = login.email.clone();
        match self.store.append_login(login).await {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::error!(%email, error = %e, "Failed to record login attempt");
                None
            }
        }
    }

    pub async fn recent_activity(
        &self,
        limit: Option<i64>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.store
            .list_activity(&ActivityQuery {
                limit: Some(clamp_limit(limit)),
                since,
                actor_id: None,
            })
            .await
    }

    pub async fn recent_logins(
        &self,
        limit: Option<i64>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LoginHistoryEntry>, StoreError> {
        self.store
            .list_logins(&LoginQuery {
                limit: Some(clamp_limit(limit)),
                since,
                account_id: None,
            })
            .await
    }

    /// Every activity entry since `since`, uncapped. Used for aggregate counts.
    pub async fn activity_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.store
            .list_activity(&ActivityQuery {
                limit: None,
                since: Some(since),
                actor_id: None,
            })
            .await
    }

    pub async fn logins_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginHistoryEntry>, StoreError> {
        self.store
            .list_logins(&LoginQuery {
                limit: None,
                since: Some(since),
                account_id: None,
            })
            .await
    }
}
