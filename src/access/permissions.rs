use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{ParseEnumError, Role};

/// A named capability granted to roles through a fixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageRoles,
    ViewUsers,
    ViewAuditLog,
    ViewDashboard,
    ManageCompanies,
    ManageBilling,
    ManageJobs,
    ViewJobs,
    EditOwnProfile,
}

const SUPER_ADMIN: &[Permission] = &[
    Permission::ManageUsers,
    Permission::ManageRoles,
    Permission::ViewUsers,
    Permission::ViewAuditLog,
    Permission::ViewDashboard,
    Permission::ManageCompanies,
    Permission::ManageBilling,
    Permission::ManageJobs,
    Permission::ViewJobs,
    Permission::EditOwnProfile,
];

const ADMIN: &[Permission] = &[
    Permission::ManageUsers,
    Permission::ViewUsers,
    Permission::ViewAuditLog,
    Permission::ViewDashboard,
    Permission::ManageCompanies,
    Permission::ManageJobs,
    Permission::ViewJobs,
    Permission::EditOwnProfile,
];

const USER: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewJobs,
    Permission::EditOwnProfile,
];

pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::SuperAdmin => SUPER_ADMIN,
        Role::Admin => ADMIN,
        Role::User => USER,
    }
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManageRoles => "manage_roles",
            Permission::ViewUsers => "view_users",
            Permission::ViewAuditLog => "view_audit_log",
            Permission::ViewDashboard => "view_dashboard",
            Permission::ManageCompanies => "manage_companies",
            Permission::ManageBilling => "manage_billing",
            Permission::ManageJobs => "manage_jobs",
            Permission::ViewJobs => "view_jobs",
            Permission::EditOwnProfile => "edit_own_profile",
        }
    }

    pub fn granted_to(&self, role: Role) -> bool {
        permissions_for(role).contains(self)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SUPER_ADMIN
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("permission", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_holds_every_permission() {
        for p in SUPER_ADMIN {
            assert!(p.granted_to(Role::SuperAdmin));
        }
    }

    #[test]
    fn admin_cannot_manage_roles_or_billing() {
        assert!(!Permission::ManageRoles.granted_to(Role::Admin));
        assert!(!Permission::ManageBilling.granted_to(Role::Admin));
        assert!(Permission::ManageUsers.granted_to(Role::Admin));
    }

    #[test]
    fn plain_user_is_limited_to_self_service() {
        assert_eq!(permissions_for(Role::User).len(), 3);
        assert!(!Permission::ViewUsers.granted_to(Role::User));
    }

    #[test]
    fn permission_names_parse() {
        assert_eq!("view_audit_log".parse(), Ok(Permission::ViewAuditLog));
        assert!("delete_everything".parse::<Permission>().is_err());
    }
}
