//! "Needs attention" health scan over tenant accounts.
//!
//! Pure functions of their inputs and `now`; nothing here is stored.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Account, CompanySubscription, Role, RoleAssignment, SubscriptionStatus, effective_assignment,
};

pub fn trial_warning_window() -> Duration {
    Duration::days(7)
}

pub fn online_window() -> Duration {
    Duration::minutes(15)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttentionReason {
    Suspended,
    PastDue,
    TrialEnding { days_left: i64 },
}

impl AttentionReason {
    fn severity(&self) -> u8 {
        match self {
            AttentionReason::Suspended => 0,
            AttentionReason::PastDue => 1,
            AttentionReason::TrialEnding { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttentionFlag {
    pub account_id: Uuid,
    pub company_name: Option<String>,
    pub reason: AttentionReason,
}

/// Why a subscription needs review, if it does.
///
/// Suspended and past-due always qualify. A trial qualifies once its end is
/// at most seven days away, including trials that have already ended.
pub fn subscription_reason(
    subscription: &CompanySubscription,
    now: DateTime<Utc>,
) -> Option<AttentionReason> {
    match subscription.status {
        SubscriptionStatus::Suspended => Some(AttentionReason::Suspended),
        SubscriptionStatus::PastDue => Some(AttentionReason::PastDue),
        SubscriptionStatus::Trial => {
            let ends_at = subscription.trial_ends_at?;
            let remaining = ends_at - now;
            (remaining <= trial_warning_window()).then(|| AttentionReason::TrialEnding {
                days_left: remaining.num_days().max(0),
            })
        }
        SubscriptionStatus::Active | SubscriptionStatus::Cancelled => None,
    }
}

fn subscription_for<'a>(
    account: &Account,
    role: Role,
    subscriptions: &'a [CompanySubscription],
) -> Option<&'a CompanySubscription> {
    subscriptions
        .iter()
        .find(|s| s.admin_account_id == Some(account.id))
        .or_else(|| {
            if !role.is_admin() {
                return None;
            }
            let company = account.company_name.as_deref()?;
            subscriptions
                .iter()
                .find(|s| s.company_name.eq_ignore_ascii_case(company))
        })
}

/// Flag tenant admin accounts whose company subscription needs review.
///
/// An account is a tenant admin when a subscription names it as
/// `admin_account_id`, or when its effective role is admin or above and its
/// company matches the subscription. Plain users are never flagged.
pub fn scan(
    accounts: &[Account],
    assignments: &[RoleAssignment],
    subscriptions: &[CompanySubscription],
    now: DateTime<Utc>,
) -> Vec<AttentionFlag> {
    let mut by_account: HashMap<Uuid, Vec<RoleAssignment>> = HashMap::new();
    for a in assignments {
        by_account.entry(a.account_id).or_default().push(a.clone());
    }

    let mut flags: Vec<AttentionFlag> = accounts
        .iter()
        .filter_map(|account| {
            let role = by_account
                .get(&account.id)
                .and_then(|rows| effective_assignment(rows, now))
                .map(|a| a.role)
                .unwrap_or_default();
            let subscription = subscription_for(account, role, subscriptions)?;
            let reason = subscription_reason(subscription, now)?;
            Some(AttentionFlag {
                account_id: account.id,
                company_name: account
                    .company_name
                    .clone()
                    .or_else(|| Some(subscription.company_name.clone())),
                reason,
            })
        })
        .collect();

    flags.sort_by_key(|f| (f.reason.severity(), f.account_id));
    flags
}

/// Seen within the last fifteen minutes; exactly fifteen is offline.
pub fn is_online(last_login: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_login < online_window()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountStatus;

    fn account(company: &str) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::now_v7(),
            email: format!("admin@{}.test", company.to_lowercase()),
            full_name: "Tenant Admin".to_string(),
            company_name: Some(company.to_string()),
            phone: None,
            department: None,
            notes: None,
            status: AccountStatus::Active,
            created_by: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn granted(account: &Account, role: Role) -> RoleAssignment {
        RoleAssignment {
            id: Uuid::now_v7(),
            account_id: account.id,
            role,
            assigned_by: None,
            assigned_at: Utc::now(),
            expires_at: None,
        }
    }

    fn trial(company: &str, ends_at: DateTime<Utc>) -> CompanySubscription {
        CompanySubscription {
            company_name: company.to_string(),
            admin_account_id: None,
            status: SubscriptionStatus::Trial,
            trial_ends_at: Some(ends_at),
        }
    }

    #[test]
    fn trial_ending_in_five_days_is_flagged() {
        let now = Utc::now();
        let accounts = [account("Acme")];
        let roles = [granted(&accounts[0], Role::Admin)];
        let flags = scan(&accounts, &roles, &[trial("Acme", now + Duration::days(5))], now);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].reason, AttentionReason::TrialEnding { days_left: 5 });
    }

    #[test]
    fn trial_ending_in_eight_days_is_not_flagged() {
        let now = Utc::now();
        let accounts = [account("Acme")];
        let roles = [granted(&accounts[0], Role::Admin)];
        assert!(scan(&accounts, &roles, &[trial("Acme", now + Duration::days(8))], now).is_empty());
    }

    #[test]
    fn trial_boundary_at_exactly_seven_days_is_flagged() {
        let now = Utc::now();
        let sub = trial("Acme", now + Duration::days(7));
        assert!(subscription_reason(&sub, now).is_some());
        let sub = trial("Acme", now + Duration::days(7) + Duration::seconds(1));
        assert!(subscription_reason(&sub, now).is_none());
    }

    #[test]
    fn suspended_is_flagged_regardless_of_trial_date() {
        let now = Utc::now();
        let mut sub = trial("Acme", now + Duration::days(300));
        sub.status = SubscriptionStatus::Suspended;
        assert_eq!(subscription_reason(&sub, now), Some(AttentionReason::Suspended));
    }

    #[test]
    fn active_and_cancelled_are_never_flagged() {
        let now = Utc::now();
        for status in [SubscriptionStatus::Active, SubscriptionStatus::Cancelled] {
            let mut sub = trial("Acme", now);
            sub.status = status;
            assert_eq!(subscription_reason(&sub, now), None);
        }
    }

    #[test]
    fn admin_account_id_takes_precedence_over_company_name() {
        let now = Utc::now();
        let tenant = account("Acme");
        let subs = [
            CompanySubscription {
                company_name: "Acme".to_string(),
                admin_account_id: None,
                status: SubscriptionStatus::Active,
                trial_ends_at: None,
            },
            CompanySubscription {
                company_name: "Acme Holdings".to_string(),
                admin_account_id: Some(tenant.id),
                status: SubscriptionStatus::PastDue,
                trial_ends_at: None,
            },
        ];
        let flags = scan(&[tenant.clone()], &[], &subs, now);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].account_id, tenant.id);
        assert_eq!(flags[0].reason, AttentionReason::PastDue);
    }

    #[test]
    fn flags_are_ordered_by_severity() {
        let now = Utc::now();
        let a = account("Alpha");
        let b = account("Beta");
        let subs = [
            trial("Alpha", now + Duration::days(1)),
            CompanySubscription {
                company_name: "beta".to_string(),
                admin_account_id: None,
                status: SubscriptionStatus::Suspended,
                trial_ends_at: None,
            },
        ];
        let roles = [granted(&a, Role::Admin), granted(&b, Role::SuperAdmin)];
        let flags = scan(&[a, b.clone()], &roles, &subs, now);
        assert_eq!(flags[0].account_id, b.id);
        assert_eq!(flags[0].reason, AttentionReason::Suspended);
    }

    #[test]
    fn suspended_company_flags_only_its_admins() {
        let now = Utc::now();
        let owner = account("Acme");
        let recruiter = account("Acme");
        let temp = account("Acme");
        let subs = [CompanySubscription {
            company_name: "Acme".to_string(),
            admin_account_id: None,
            status: SubscriptionStatus::Suspended,
            trial_ends_at: None,
        }];
        let roles = [granted(&owner, Role::Admin), granted(&recruiter, Role::User)];

        let flags = scan(&[owner.clone(), recruiter, temp], &roles, &subs, now);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].account_id, owner.id);
        assert_eq!(flags[0].reason, AttentionReason::Suspended);
    }

    #[test]
    fn expired_admin_grant_is_not_flagged() {
        let now = Utc::now();
        let former = account("Acme");
        let mut grant = granted(&former, Role::Admin);
        grant.expires_at = Some(now - Duration::hours(1));
        let subs = [CompanySubscription {
            company_name: "Acme".to_string(),
            admin_account_id: None,
            status: SubscriptionStatus::PastDue,
            trial_ends_at: None,
        }];
        assert!(scan(&[former], &[grant], &subs, now).is_empty());
    }

    #[test]
    fn online_window_is_strict() {
        let now = Utc::now();
        assert!(is_online(now - Duration::minutes(14) - Duration::seconds(59), now));
        assert!(!is_online(now - Duration::minutes(15), now));
    }
}
