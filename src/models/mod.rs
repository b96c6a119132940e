pub mod account;
pub mod activity;
pub mod login;
pub mod role;
pub mod subscription;

pub use account::{Account, AccountFilter, AccountStatus, ProfileUpdate, ProfileUpsert};
pub use activity::{ActivityLogEntry, ActivityQuery, NewActivity};
pub use login::{LoginHistoryEntry, LoginQuery, NewLogin};
pub use role::{NewRoleAssignment, Role, RoleAssignment, effective_assignment};
pub use subscription::{CompanySubscription, SubscriptionStatus};

/// Raised when a stored enum column holds a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
