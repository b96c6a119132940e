use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::attention::is_online;
use crate::models::{
    Account, AccountStatus, ActivityLogEntry, LoginHistoryEntry, Role, RoleAssignment,
    effective_assignment,
};

pub fn stats_window() -> Duration {
    Duration::hours(24)
}

/// Point-in-time dashboard counters, computed on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsSnapshot {
    pub total_users: usize,
    pub active_users: usize,
    pub suspended_users: usize,
    pub pending_users: usize,
    pub admins: usize,
    pub super_admins: usize,
    pub online_users: usize,
    /// Successful logins in the trailing window. Failed attempts from the
    /// same window are counted separately in `failed_logins`, so the two
    /// together cover every login-history entry in the window.
    pub recent_logins: usize,
    pub failed_logins: usize,
    pub recent_activities: usize,
}

fn in_window(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    at > now - stats_window() && at <= now
}

pub fn snapshot(
    accounts: &[Account],
    assignments: &[RoleAssignment],
    activity: &[ActivityLogEntry],
    logins: &[LoginHistoryEntry],
    now: DateTime<Utc>,
) -> AdminStatsSnapshot {
    let mut by_account: HashMap<Uuid, Vec<RoleAssignment>> = HashMap::new();
    for a in assignments {
        by_account.entry(a.account_id).or_default().push(a.clone());
    }

    let mut stats = AdminStatsSnapshot {
        total_users: accounts.len(),
        ..Default::default()
    };

    for account in accounts {
        match account.status {
            AccountStatus::Active => stats.active_users += 1,
            AccountStatus::Suspended => stats.suspended_users += 1,
            AccountStatus::Pending => stats.pending_users += 1,
        }

        let role = by_account
            .get(&account.id)
            .and_then(|rows| effective_assignment(rows, now))
            .map(|a| a.role)
            .unwrap_or_default();
        match role {
            Role::SuperAdmin => stats.super_admins += 1,
            Role::Admin => stats.admins += 1,
            Role::User => {}
        }

        if account.last_login_at.is_some_and(|at| is_online(at, now)) {
            stats.online_users += 1;
        }
    }

    for login in logins.iter().filter(|l| in_window(l.created_at, now)) {
        if login.success {
            stats.recent_logins += 1;
        } else {
            stats.failed_logins += 1;
        }
    }

    stats.recent_activities = activity
        .iter()
        .filter(|e| in_window(e.created_at, now))
        .count();

    stats
}

/// Keep only the history entries that concern `accounts`: logins by them and
/// activity performed by or on them.
pub fn restrict_to_accounts(
    accounts: &[Account],
    activity: Vec<ActivityLogEntry>,
    logins: Vec<LoginHistoryEntry>,
) -> (Vec<ActivityLogEntry>, Vec<LoginHistoryEntry>) {
    let ids: HashSet<Uuid> = accounts.iter().map(|a| a.id).collect();
    let touches = |id: Option<Uuid>| id.is_some_and(|id| ids.contains(&id));

    let activity = activity
        .into_iter()
        .filter(|e| touches(e.actor_id) || touches(e.entity_id))
        .collect();
    let logins = logins.into_iter().filter(|l| touches(l.account_id)).collect();
    (activity, logins)
}
