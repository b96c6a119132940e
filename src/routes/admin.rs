use std::collections::HashMap;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::access::Permission;
use crate::attention::{self, AttentionFlag};
use crate::auth::AuthUser;
use crate::db::{AccountStore, RoleStore, SubscriptionSource};
use crate::error::AppError;
use crate::models::{
    Account, AccountFilter, AccountStatus, ActivityLogEntry, LoginHistoryEntry, NewActivity,
    NewRoleAssignment, ProfileUpdate, Role, effective_assignment,
};
use crate::provisioning::CreateUserRequest;
use crate::state::SharedState;
use crate::stats::{self, AdminStatsSnapshot};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

async fn find_account(state: &SharedState, id: Uuid) -> Result<Account, AppError> {
    state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn create_user(
    auth: AuthUser,
    State(state): State<SharedState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    // Authorization is decided before the body is looked at.
    state
        .resolver
        .require_super_admin(auth.account_id, crate::provisioning::SUPER_ADMIN_ONLY)
        .await?;
    let req = body(payload)?;

    let user = state.provisioner.create_user(req, auth.account_id).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub role: Role,
    pub is_online: bool,
}

pub async fn list_users(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(filter): Query<AccountFilter>,
) -> Result<Json<Vec<AccountView>>, AppError> {
    state
        .resolver
        .require(auth.account_id, Permission::ViewUsers)
        .await?;

    let accounts = state.accounts.list(&filter).await?;
    let assignments = state.roles.list_assignments().await?;
    let now = Utc::now();

    let mut by_account: HashMap<Uuid, Vec<_>> = HashMap::new();
    for a in assignments {
        by_account.entry(a.account_id).or_default().push(a);
    }

    let users = accounts
        .into_iter()
        .map(|account| {
            let role = by_account
                .get(&account.id)
                .and_then(|rows| effective_assignment(rows, now))
                .map(|a| a.role)
                .unwrap_or_default();
            let is_online = account
                .last_login_at
                .is_some_and(|at| attention::is_online(at, now));
            AccountView {
                account,
                role,
                is_online,
            }
        })
        .collect();

    Ok(Json(users))
}

/// Whether any account other than `id` holds an effective super_admin role
/// with no expiry.
async fn other_super_admin_exists(state: &SharedState, id: Uuid) -> Result<bool, AppError> {
    let now = Utc::now();
    let mut by_account: HashMap<Uuid, Vec<_>> = HashMap::new();
    for a in state.roles.list_assignments().await? {
        if a.account_id != id {
            by_account.entry(a.account_id).or_default().push(a);
        }
    }
    Ok(by_account.values().any(|rows| {
        effective_assignment(rows, now)
            .is_some_and(|a| a.role == Role::SuperAdmin && a.expires_at.is_none())
    }))
}

#[derive(Deserialize)]
pub struct ChangeRole {
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn change_role(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ChangeRole>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    state
        .resolver
        .require_super_admin(auth.account_id, "Only super admins can change roles")
        .await?;
    let req = body(payload)?;
    if req.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(AppError::BadRequest(
            "expires_at must be in the future".to_string(),
        ));
    }
    find_account(&state, id).await?;

    let rows = state.roles.assignments_for(id).await?;
    let previous = state.resolver.try_resolve_role(id).await?;
    let steps_down = req.role != Role::SuperAdmin || req.expires_at.is_some();
    if previous == Role::SuperAdmin
        && steps_down
        && !other_super_admin_exists(&state, id).await?
    {
        return Err(AppError::BadRequest(
            "Cannot remove the last super admin".to_string(),
        ));
    }

    let assignment = match rows.first() {
        Some(existing) => {
            state
                .roles
                .replace_assignment(existing.id, req.role, Some(auth.account_id), req.expires_at)
                .await?
        }
        None => {
            state
                .roles
                .insert_assignment(NewRoleAssignment {
                    account_id: id,
                    role: req.role,
                    assigned_by: Some(auth.account_id),
                    assigned_at: Utc::now(),
                    expires_at: req.expires_at,
                })
                .await?
        }
    };

    state
        .audit
        .record_best_effort(
            NewActivity::new(Some(auth.account_id), "role_changed", "account", Some(id))
                .with_details(json!({ "from": previous, "to": req.role })),
        )
        .await;
    tracing::info!(account_id = %id, from = %previous, to = %req.role, "Role changed");

    Ok(Json(json!({ "success": true, "assignment": assignment })))
}

#[derive(Deserialize)]
pub struct SetStatus {
    pub status: AccountStatus,
}

pub async fn set_status(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SetStatus>, JsonRejection>,
) -> Result<Json<Account>, AppError> {
    state
        .resolver
        .require(auth.account_id, Permission::ManageUsers)
        .await?;
    let req = body(payload)?;
    let before = find_account(&state, id).await?;

    let account = state.accounts.update_status(id, req.status).await?;
    state
        .audit
        .record_best_effort(
            NewActivity::new(Some(auth.account_id), "status_changed", "account", Some(id))
                .with_details(json!({ "from": before.status, "to": account.status })),
        )
        .await;

    Ok(Json(account))
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Account>, AppError> {
    state
        .resolver
        .require(auth.account_id, Permission::ManageUsers)
        .await?;
    let update = body(payload)?;
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    if update
        .full_name
        .as_deref()
        .is_some_and(|n| n.trim().is_empty())
    {
        return Err(AppError::BadRequest("full_name cannot be empty".to_string()));
    }
    find_account(&state, id).await?;

    let account = state.accounts.update_profile(id, &update).await?;
    state
        .audit
        .record_best_effort(
            NewActivity::new(Some(auth.account_id), "profile_updated", "account", Some(id))
                .with_details(json!({ "fields": update.changed_fields() })),
        )
        .await;

    Ok(Json(account))
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub company: Option<String>,
}

pub async fn stats(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AdminStatsSnapshot>, AppError> {
    state.resolver.require_admin(auth.account_id).await?;
    state
        .resolver
        .require(auth.account_id, Permission::ViewDashboard)
        .await?;

    let now = Utc::now();
    let since = now - stats::stats_window();
    let filter = AccountFilter {
        status: None,
        company: query.company.clone(),
    };
    let accounts = state.accounts.list(&filter).await?;
    let assignments = state.roles.list_assignments().await?;
    let mut activity = state.audit.activity_since(since).await?;
    let mut logins = state.audit.logins_since(since).await?;

    if query.company.is_some() {
        (activity, logins) = stats::restrict_to_accounts(&accounts, activity, logins);
    }

    Ok(Json(stats::snapshot(
        &accounts,
        &assignments,
        &activity,
        &logins,
        now,
    )))
}

pub async fn attention(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AttentionFlag>>, AppError> {
    state.resolver.require_admin(auth.account_id).await?;

    let accounts = state.accounts.list(&AccountFilter::default()).await?;
    let assignments = state.roles.list_assignments().await?;
    let subscriptions = state.subscriptions.list_subscriptions().await?;
    Ok(Json(attention::scan(
        &accounts,
        &assignments,
        &subscriptions,
        Utc::now(),
    )))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub since: Option<DateTime<Utc>>,
}

pub async fn activity(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ActivityLogEntry>>, AppError> {
    state
        .resolver
        .require(auth.account_id, Permission::ViewAuditLog)
        .await?;
    let entries = state
        .audit
        .recent_activity(query.limit, query.since)
        .await?;
    Ok(Json(entries))
}

pub async fn logins(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LoginHistoryEntry>>, AppError> {
    state
        .resolver
        .require(auth.account_id, Permission::ViewAuditLog)
        .await?;
    let entries = state.audit.recent_logins(query.limit, query.since).await?;
    Ok(Json(entries))
}
