//! Operator account creation.
//!
//! Creating the external identity is the commit point. The profile row, the
//! role assignment and the activity entry that follow are each best-effort:
//! a failure is logged for reconciliation and the caller still gets the new
//! account id. Those steps run on their own task so a caller that goes away
//! cannot interrupt them, and the response waits for them only up to
//! `settle_timeout`.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::access::PermissionResolver;
use crate::audit::AuditTrail;
use crate::db::{AccountStore, RoleStore, StoreError};
use crate::error::AppError;
use crate::identity::{IdentityError, IdentityProvider, normalize_email};
use crate::models::{AccountStatus, NewActivity, NewRoleAssignment, ProfileUpsert, Role};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

pub const SUPER_ADMIN_ONLY: &str = "Only super admins can create users";

/// Body of the provisioning endpoint. Required fields default to empty so
/// that absence is reported as a validation error, not a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct NewOperator {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionedUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Forbidden(String),
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProvisionError> for AppError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Forbidden(msg) => AppError::Forbidden(msg),
            ProvisionError::MissingFields(_) | ProvisionError::Invalid(_) => {
                AppError::BadRequest(err.to_string())
            }
            ProvisionError::Identity(e) => e.into(),
            ProvisionError::Store(e) => e.into(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<NewOperator, ProvisionError> {
        let email = normalize_email(&self.email);
        let full_name = self.full_name.trim().to_string();
        let role = self.role.trim().to_string();

        let missing: Vec<&'static str> = [
            ("email", email.is_empty()),
            ("password", self.password.is_empty()),
            ("full_name", full_name.is_empty()),
            ("role", role.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(ProvisionError::MissingFields(missing));
        }

        if !EMAIL_RE.is_match(&email) {
            return Err(ProvisionError::Invalid("Invalid email address".to_string()));
        }
        let role: Role = role
            .parse()
            .map_err(|_| ProvisionError::Invalid(format!("Invalid role: {role}")))?;

        Ok(NewOperator {
            email,
            password: self.password,
            full_name,
            role,
            company_name: non_empty(self.company_name),
            phone: non_empty(self.phone),
            department: non_empty(self.department),
            notes: non_empty(self.notes),
        })
    }
}

/// What the follow-up steps need after the identity exists.
struct Followup {
    account_id: Uuid,
    operator: NewOperator,
    actor: Option<Uuid>,
    action: &'static str,
}

#[derive(Clone)]
pub struct Provisioner {
    resolver: PermissionResolver,
    identity: Arc<dyn IdentityProvider>,
    accounts: Arc<dyn AccountStore>,
    roles: Arc<dyn RoleStore>,
    audit: AuditTrail,
    settle_timeout: Duration,
}

impl Provisioner {
    pub fn new(
        resolver: PermissionResolver,
        identity: Arc<dyn IdentityProvider>,
        accounts: Arc<dyn AccountStore>,
        roles: Arc<dyn RoleStore>,
        audit: AuditTrail,
        settle_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            identity,
            accounts,
            roles,
            audit,
            settle_timeout,
        }
    }

    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        caller: Uuid,
    ) -> Result<ProvisionedUser, ProvisionError> {
        if !self.resolver.is_super_admin(caller).await {
            tracing::debug!(%caller, "Rejected user creation by non super admin");
            return Err(ProvisionError::Forbidden(SUPER_ADMIN_ONLY.to_string()));
        }
        let operator = request.validate()?;

        let account_id = self
            .identity
            .create_identity(&operator.email, &operator.password)
            .await?;
        tracing::info!(%account_id, email = %operator.email, role = %operator.role, "Identity created");

        let user = ProvisionedUser {
            id: account_id,
            email: operator.email.clone(),
            full_name: operator.full_name.clone(),
        };
        self.settle(Followup {
            account_id,
            operator,
            actor: Some(caller),
            action: "created_user",
        })
        .await;

        Ok(user)
    }

    /// Provision the first super admin when none exists yet.
    ///
    /// Returns `Ok(None)` when a super admin is already present.
    pub async fn bootstrap_super_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<ProvisionedUser>, ProvisionError> {
        let assignments = self.roles.list_assignments().await?;
        let now = Utc::now();
        if assignments
            .iter()
            .any(|a| a.role.is_super_admin() && a.is_effective(now))
        {
            return Ok(None);
        }

        let operator = CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: "Super Admin".to_string(),
            role: Role::SuperAdmin.as_str().to_string(),
            ..Default::default()
        }
        .validate()?;

        let account_id = self
            .identity
            .create_identity(&operator.email, &operator.password)
            .await?;
        let user = ProvisionedUser {
            id: account_id,
            email: operator.email.clone(),
            full_name: operator.full_name.clone(),
        };
        self.settle(Followup {
            account_id,
            operator,
            actor: None,
            action: "bootstrapped_super_admin",
        })
        .await;

        tracing::info!(account_id = %user.id, "Bootstrapped super admin");
        Ok(Some(user))
    }

    /// Run the follow-up steps detached and wait for them up to the timeout.
    async fn settle(&self, followup: Followup) {
        let account_id = followup.account_id;
        let this = self.clone();
        let handle = tokio::spawn(async move { this.complete(followup).await });

        match tokio::time::timeout(self.settle_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(%account_id, error = %e, "Provisioning follow-up task failed");
            }
            Err(_) => {
                tracing::warn!(%account_id, "Provisioning follow-up still running, responding anyway");
            }
        }
    }

    async fn complete(&self, followup: Followup) {
        let Followup {
            account_id,
            operator,
            actor,
            action,
        } = followup;

        let profile = ProfileUpsert {
            id: account_id,
            email: operator.email.clone(),
            full_name: operator.full_name.clone(),
            company_name: operator.company_name.clone(),
            phone: operator.phone.clone(),
            department: operator.department.clone(),
            notes: operator.notes.clone(),
            status: AccountStatus::Active,
            created_by: actor,
        };
        if let Err(e) = self.accounts.upsert_profile(profile).await {
            tracing::warn!(%account_id, step = "profile", error = %e, "Partial provisioning failure");
        }

        let assignment = NewRoleAssignment {
            account_id,
            role: operator.role,
            assigned_by: actor,
            assigned_at: Utc::now(),
            expires_at: None,
        };
        if let Err(e) = self.roles.insert_assignment(assignment).await {
            tracing::warn!(%account_id, step = "role", error = %e, "Partial provisioning failure");
        }

        let entry = NewActivity::new(actor, action, "account", Some(account_id)).with_details(
            json!({
                "email": operator.email,
                "role": operator.role,
                "full_name": operator.full_name,
            }),
        );
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(%account_id, step = "activity", error = %e, "Partial provisioning failure");
        }
    }
}
