use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::permissions::{Permission, permissions_for};
use crate::db::{RoleStore, StoreError};
use crate::error::AppError;
use crate::models::{Role, effective_assignment};

/// The one place that decides what an account may do.
///
/// Reads role assignments only. Profile data never reaches this type, so
/// editing an account cannot change its permissions. Gating checks fail
/// closed: a store error is treated as "not permitted".
#[derive(Clone)]
pub struct PermissionResolver {
    roles: Arc<dyn RoleStore>,
}

impl PermissionResolver {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    /// Effective role, or the store error for callers that can show a
    /// loading or error state instead of gating on it.
    pub async fn try_resolve_role(&self, account_id: Uuid) -> Result<Role, StoreError> {
        let rows = self.roles.assignments_for(account_id).await?;
        Ok(effective_assignment(&rows, Utc::now())
            .map(|a| a.role)
            .unwrap_or_default())
    }

    /// Effective role, falling back to [`Role::User`] when none is assigned
    /// or the store cannot be read.
    pub async fn resolve_role(&self, account_id: Uuid) -> Role {
        self.try_resolve_role(account_id)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(%account_id, error = %err, "Role lookup failed, using default role");
                Role::User
            })
    }

    pub async fn has_permission(&self, account_id: Uuid, permission: Permission) -> bool {
        match self.try_resolve_role(account_id).await {
            Ok(role) => permission.granted_to(role),
            Err(err) => {
                tracing::warn!(%account_id, %permission, error = %err, "Permission check failed closed");
                false
            }
        }
    }

    pub async fn is_admin(&self, account_id: Uuid) -> bool {
        self.try_resolve_role(account_id)
            .await
            .is_ok_and(|role| role.is_admin())
    }

    pub async fn is_super_admin(&self, account_id: Uuid) -> bool {
        self.try_resolve_role(account_id)
            .await
            .is_ok_and(|role| role.is_super_admin())
    }

    pub async fn permissions(
        &self,
        account_id: Uuid,
    ) -> Result<(Role, &'static [Permission]), StoreError> {
        let role = self.try_resolve_role(account_id).await?;
        Ok((role, permissions_for(role)))
    }

    /// Gate an operation on a permission; returns the caller's role on success.
    pub async fn require(
        &self,
        account_id: Uuid,
        permission: Permission,
    ) -> Result<Role, AppError> {
        let role = match self.try_resolve_role(account_id).await {
            Ok(role) => role,
            Err(err) => {
                tracing::warn!(%account_id, %permission, error = %err, "Permission check failed closed");
                return Err(AppError::Forbidden("Insufficient permissions".to_string()));
            }
        };
        if permission.granted_to(role) {
            Ok(role)
        } else {
            tracing::debug!(%account_id, %role, %permission, "Permission denied");
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    pub async fn require_admin(&self, account_id: Uuid) -> Result<Role, AppError> {
        match self.try_resolve_role(account_id).await {
            Ok(role) if role.is_admin() => Ok(role),
            Ok(role) => {
                tracing::debug!(%account_id, %role, "Admin access denied");
                Err(AppError::Forbidden("Admin access required".to_string()))
            }
            Err(err) => {
                tracing::warn!(%account_id, error = %err, "Admin check failed closed");
                Err(AppError::Forbidden("Admin access required".to_string()))
            }
        }
    }

    pub async fn require_super_admin(
        &self,
        account_id: Uuid,
        message: &str,
    ) -> Result<(), AppError> {
        if self.is_super_admin(account_id).await {
            Ok(())
        } else {
            tracing::debug!(%account_id, "Super admin access denied");
            Err(AppError::Forbidden(message.to_string()))
        }
    }
}
