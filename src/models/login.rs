use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One authentication attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginHistoryEntry {
    pub id: Uuid,
    /// Unknown when the attempted email matches no account.
    pub account_id: Option<Uuid>,
    pub email: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLogin {
    pub account_id: Option<Uuid>,
    pub email: String,
    pub success: bool,
    failure_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewLogin {
    /// Builds an entry where a reason is kept only for failed attempts.
    pub fn new(
        account_id: Option<Uuid>,
        email: impl Into<String>,
        success: bool,
        failure_reason: Option<String>,
    ) -> Self {
        let failure_reason = if success {
            None
        } else {
            Some(failure_reason.unwrap_or_else(|| "unknown".to_string()))
        };
        Self {
            account_id,
            email: email.into(),
            success,
            failure_reason,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginQuery {
    pub limit: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub account_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_login_drops_failure_reason() {
        let entry = NewLogin::new(None, "a@b.com", true, Some("ignored".into()));
        assert_eq!(entry.failure_reason(), None);
    }

    #[test]
    fn failed_login_always_has_a_reason() {
        let entry = NewLogin::new(None, "a@b.com", false, None);
        assert_eq!(entry.failure_reason(), Some("unknown"));
    }
}
