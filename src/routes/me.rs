use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::access::Permission;
use crate::attention::is_online;
use crate::auth::AuthUser;
use crate::db::AccountStore;
use crate::error::AppError;
use crate::models::{Account, Role};
use crate::state::SharedState;

#[derive(Serialize)]
pub struct MeResponse {
    pub account_id: Uuid,
    pub account: Option<Account>,
    pub role: Role,
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub permissions: &'static [Permission],
    pub is_online: bool,
}

pub async fn me(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<MeResponse>, AppError> {
    let (role, permissions) = state.resolver.permissions(auth.account_id).await?;
    let account = state.accounts.find_by_id(auth.account_id).await?;
    let is_online = account
        .as_ref()
        .and_then(|a| a.last_login_at)
        .is_some_and(|at| is_online(at, Utc::now()));

    Ok(Json(MeResponse {
        account_id: auth.account_id,
        account,
        role,
        is_admin: role.is_admin(),
        is_super_admin: role.is_super_admin(),
        permissions,
        is_online,
    }))
}

pub async fn has_permission(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(permission): Path<String>,
) -> Result<Json<Value>, AppError> {
    let permission: Permission = permission
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown permission: {permission}")))?;
    let granted = state
        .resolver
        .has_permission(auth.account_id, permission)
        .await;
    Ok(Json(json!({ "permission": permission, "granted": granted })))
}
