use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// The sole unit of authorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    /// Applies to every account without an effective assignment.
    #[default]
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// Durable binding of an account to a role. Kept apart from the profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub role: Role,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewRoleAssignment {
    pub account_id: Uuid,
    pub role: Role,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Pick the single assignment that counts for an account.
///
/// Expired rows are ignored; among the rest the most recently assigned wins.
/// Callers pass the rows of one account.
pub fn effective_assignment(
    rows: &[RoleAssignment],
    now: DateTime<Utc>,
) -> Option<&RoleAssignment> {
    rows.iter()
        .filter(|a| a.is_effective(now))
        .max_by_key(|a| (a.assigned_at, a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assignment(role: Role, assigned_at: DateTime<Utc>) -> RoleAssignment {
        RoleAssignment {
            id: Uuid::now_v7(),
            account_id: Uuid::nil(),
            role,
            assigned_by: None,
            assigned_at,
            expires_at: None,
        }
    }

    #[test]
    fn no_rows_means_no_effective_assignment() {
        assert!(effective_assignment(&[], Utc::now()).is_none());
    }

    #[test]
    fn latest_unexpired_assignment_wins() {
        let now = Utc::now();
        let older = assignment(Role::Admin, now - Duration::days(2));
        let newer = assignment(Role::SuperAdmin, now - Duration::days(1));
        let rows = vec![older, newer.clone()];
        assert_eq!(effective_assignment(&rows, now), Some(&newer));
    }

    #[test]
    fn expired_assignment_is_skipped() {
        let now = Utc::now();
        let mut expired = assignment(Role::SuperAdmin, now - Duration::hours(1));
        expired.expires_at = Some(now);
        let fallback = assignment(Role::Admin, now - Duration::days(3));
        let rows = vec![expired, fallback.clone()];
        assert_eq!(effective_assignment(&rows, now), Some(&fallback));
    }

    #[test]
    fn role_names_round_trip_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("owner".parse::<Role>().is_err());
    }
}
