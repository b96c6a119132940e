use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, AuditStore, RoleStore, StoreError, SubscriptionSource};
use crate::models::{
    Account, AccountFilter, AccountStatus, ActivityLogEntry, ActivityQuery, CompanySubscription,
    LoginHistoryEntry, LoginQuery, NewActivity, NewLogin, NewRoleAssignment, ProfileUpdate,
    ProfileUpsert, Role, RoleAssignment,
};

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    assignments: Vec<RoleAssignment>,
    activity: Vec<ActivityLogEntry>,
    logins: Vec<LoginHistoryEntry>,
    subscriptions: Vec<CompanySubscription>,
}

/// Process-local store used by the test suite and `STAFFDESK_STORAGE=memory`.
///
/// The `fail_*` switches make the matching write return an error so callers
/// can be exercised against a misbehaving backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    fail_profile_upserts: AtomicBool,
    fail_role_inserts: AtomicBool,
    fail_activity_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }

    pub fn fail_profile_upserts(&self, on: bool) {
        self.fail_profile_upserts.store(on, Ordering::SeqCst);
    }

    pub fn fail_role_inserts(&self, on: bool) {
        self.fail_role_inserts.store(on, Ordering::SeqCst);
    }

    pub fn fail_activity_appends(&self, on: bool) {
        self.fail_activity_appends.store(on, Ordering::SeqCst);
    }

    pub async fn add_subscription(&self, subscription: CompanySubscription) {
        self.tables.write().await.subscriptions.push(subscription);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Conflict(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

fn newest_first<T>(mut rows: Vec<T>, key: impl Fn(&T) -> (DateTime<Utc>, Uuid), limit: Option<i64>) -> Vec<T> {
    rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
    if let Some(limit) = limit {
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    }
    rows
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn upsert_profile(&self, profile: ProfileUpsert) -> Result<Account, StoreError> {
        self.check()?;
        Self::injected(&self.fail_profile_upserts, "profile upsert")?;

        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let existing = tables.accounts.iter_mut().find(|a| a.id == profile.id);
        let account = match existing {
            Some(account) => {
                account.email = profile.email;
                account.full_name = profile.full_name;
                account.company_name = profile.company_name;
                account.phone = profile.phone;
                account.department = profile.department;
                account.notes = profile.notes;
                account.status = profile.status;
                account.created_by = profile.created_by;
                account.updated_at = now;
                account.clone()
            }
            None => {
                let account = Account {
                    id: profile.id,
                    email: profile.email,
                    full_name: profile.full_name,
                    company_name: profile.company_name,
                    phone: profile.phone,
                    department: profile.department,
                    notes: profile.notes,
                    status: profile.status,
                    created_by: profile.created_by,
                    last_login_at: None,
                    created_at: now,
                    updated_at: now,
                };
                tables.accounts.push(account.clone());
                account
            }
        };
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.check()?;
        let email = email.trim();
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self, filter: &AccountFilter) -> Result<Vec<Account>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let rows = tables
            .accounts
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        Ok(newest_first(rows, |a| (a.created_at, a.id), None))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Account, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        update.apply(account);
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<Account, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        account.status = status;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(account) = tables.accounts.iter_mut().find(|a| a.id == id) {
            account.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn insert_assignment(
        &self,
        new: NewRoleAssignment,
    ) -> Result<RoleAssignment, StoreError> {
        self.check()?;
        Self::injected(&self.fail_role_inserts, "role assignment insert")?;

        let mut tables = self.tables.write().await;
        if tables.assignments.iter().any(|a| a.account_id == new.account_id) {
            return Err(StoreError::Conflict(format!(
                "role assignment already exists for account {}",
                new.account_id
            )));
        }
        let assignment = RoleAssignment {
            id: Uuid::now_v7(),
            account_id: new.account_id,
            role: new.role,
            assigned_by: new.assigned_by,
            assigned_at: new.assigned_at,
            expires_at: new.expires_at,
        };
        tables.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn assignments_for(&self, account_id: Uuid) -> Result<Vec<RoleAssignment>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let rows = tables
            .assignments
            .iter()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |a| (a.assigned_at, a.id), None))
    }

    async fn list_assignments(&self) -> Result<Vec<RoleAssignment>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.assignments.clone(),
            |a| (a.assigned_at, a.id),
            None,
        ))
    }

    async fn replace_assignment(
        &self,
        id: Uuid,
        role: Role,
        assigned_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<RoleAssignment, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let assignment = tables
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        assignment.role = role;
        assignment.assigned_by = assigned_by;
        assignment.assigned_at = Utc::now();
        assignment.expires_at = expires_at;
        Ok(assignment.clone())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError> {
        self.check()?;
        Self::injected(&self.fail_activity_appends, "activity append")?;

        let row = ActivityLogEntry {
            id: Uuid::now_v7(),
            actor_id: entry.actor_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.tables.write().await.activity.push(row.clone());
        Ok(row)
    }

    async fn append_login(&self, entry: NewLogin) -> Result<LoginHistoryEntry, StoreError> {
        self.check()?;
        let row = LoginHistoryEntry {
            id: Uuid::now_v7(),
            account_id: entry.account_id,
            failure_reason: entry.failure_reason().map(str::to_string),
            email: entry.email,
            success: entry.success,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: Utc::now(),
        };
        self.tables.write().await.logins.push(row.clone());
        Ok(row)
    }

    async fn list_activity(
        &self,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let rows = tables
            .activity
            .iter()
            .filter(|e| query.since.is_none_or(|since| e.created_at >= since))
            .filter(|e| query.actor_id.is_none_or(|actor| e.actor_id == Some(actor)))
            .cloned()
            .collect();
        Ok(newest_first(rows, |e| (e.created_at, e.id), query.limit))
    }

    async fn list_logins(&self, query: &LoginQuery) -> Result<Vec<LoginHistoryEntry>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let rows = tables
            .logins
            .iter()
            .filter(|e| query.since.is_none_or(|since| e.created_at >= since))
            .filter(|e| query.account_id.is_none_or(|id| e.account_id == Some(id)))
            .cloned()
            .collect();
        Ok(newest_first(rows, |e| (e.created_at, e.id), query.limit))
    }
}

#[async_trait]
impl SubscriptionSource for MemoryStore {
    async fn list_subscriptions(&self) -> Result<Vec<CompanySubscription>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.subscriptions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(email: &str) -> ProfileUpsert {
        ProfileUpsert {
            id: Uuid::now_v7(),
            email: email.to_string(),
            full_name: "Casey Doe".to_string(),
            company_name: Some("Acme".to_string()),
            phone: None,
            department: None,
            notes: None,
            status: AccountStatus::Active,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_profile() {
        let store = MemoryStore::new();
        let mut p = profile("casey@acme.test");
        store.upsert_profile(p.clone()).await.unwrap();
        p.full_name = "Casey Q. Doe".to_string();
        let account = store.upsert_profile(p.clone()).await.unwrap();

        assert_eq!(account.full_name, "Casey Q. Doe");
        let all = store.list(&AccountFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn second_role_assignment_for_account_conflicts() {
        let store = MemoryStore::new();
        let account_id = Uuid::now_v7();
        let new = NewRoleAssignment {
            account_id,
            role: Role::Admin,
            assigned_by: None,
            assigned_at: Utc::now(),
            expires_at: None,
        };
        store.insert_assignment(new.clone()).await.unwrap();
        let err = store
            .insert_assignment(NewRoleAssignment {
                role: Role::SuperAdmin,
                ..new
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.assignments_for(account_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn activity_is_listed_newest_first_and_capped() {
        let store = MemoryStore::new();
        for action in ["first", "second", "third"] {
            store
                .append_activity(NewActivity::new(None, action, "test", None))
                .await
                .unwrap();
        }
        let rows = store
            .list_activity(&ActivityQuery {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        let actions: Vec<_> = rows.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn unavailable_store_rejects_reads() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.assignments_for(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
