use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Pending,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "pending" => Ok(AccountStatus::Pending),
            other => Err(ParseEnumError::new("account status", other)),
        }
    }
}

/// Profile record for an operator or tenant account.
///
/// Holds no role information: nothing here is ever consulted for an
/// authorization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
    pub status: AccountStatus,
    pub created_by: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full profile written right after the identity is created.
#[derive(Debug, Clone)]
pub struct ProfileUpsert {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
    pub status: AccountStatus,
    pub created_by: Option<Uuid>,
}

/// Partial profile edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.company_name.is_none()
            && self.phone.is_none()
            && self.department.is_none()
            && self.notes.is_none()
    }

    /// Names of the fields this update sets.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", self.full_name.is_some()),
            ("company_name", self.company_name.is_some()),
            ("phone", self.phone.is_some()),
            ("department", self.department.is_some()),
            ("notes", self.notes.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(v) = &self.full_name {
            account.full_name = v.clone();
        }
        if let Some(v) = &self.company_name {
            account.company_name = Some(v.clone());
        }
        if let Some(v) = &self.phone {
            account.phone = Some(v.clone());
        }
        if let Some(v) = &self.department {
            account.department = Some(v.clone());
        }
        if let Some(v) = &self.notes {
            account.notes = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountFilter {
    pub status: Option<AccountStatus>,
    pub company: Option<String>,
}

impl AccountFilter {
    pub fn matches(&self, account: &Account) -> bool {
        if self.status.is_some_and(|s| s != account.status) {
            return false;
        }
        match &self.company {
            Some(company) => account
                .company_name
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(company)),
            None => true,
        }
    }
}
