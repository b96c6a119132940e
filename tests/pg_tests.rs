mod common;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use staffdesk_access::config::{Config, StorageBackend};
use staffdesk_access::db::{AccountStore, AuditStore, PgStore, RoleStore, StoreError};
use staffdesk_access::identity::{IdentityError, IdentityProvider, LocalIdentity};
use staffdesk_access::models::{
    AccountStatus, NewActivity, NewLogin, NewRoleAssignment, ProfileUpsert, Role,
};
use staffdesk_access::state::{AppState, Backends};

const SECRET: &str = "test-jwt-secret-that-is-long-enough";

fn grant(account_id: Uuid, role: Role) -> NewRoleAssignment {
    NewRoleAssignment {
        account_id,
        role,
        assigned_by: None,
        assigned_at: Utc::now(),
        expires_at: None,
    }
}

// ── Roles ───────────────────────────────────────────────────────

#[tokio::test]
async fn second_role_assignment_for_account_conflicts() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let store = PgStore::new(db.pool.clone());
    let account_id = Uuid::now_v7();

    let first = store
        .insert_assignment(grant(account_id, Role::Admin))
        .await
        .unwrap();
    assert_eq!(first.role, Role::Admin);

    let err = store
        .insert_assignment(grant(account_id, Role::SuperAdmin))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");

    let rows = store.assignments_for(account_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role, Role::Admin);

    let replaced = store
        .replace_assignment(first.id, Role::User, None, None)
        .await
        .unwrap();
    assert_eq!(replaced.role, Role::User);

    common::cleanup(db).await;
}

// ── Audit trail ─────────────────────────────────────────────────

#[tokio::test]
async fn activity_log_rejects_update_and_delete() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let store = PgStore::new(db.pool.clone());
    let entry = store
        .append_activity(
            NewActivity::new(None, "created_user", "account", Some(Uuid::now_v7()))
                .with_details(json!({ "role": "user" })),
        )
        .await
        .unwrap();

    let update = sqlx::query("UPDATE activity_log SET action = 'edited' WHERE id = $1")
        .bind(entry.id)
        .execute(&db.pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM activity_log WHERE id = $1")
        .bind(entry.id)
        .execute(&db.pool)
        .await;
    assert!(delete.is_err());

    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM activity_log")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    common::cleanup(db).await;
}

#[tokio::test]
async fn login_history_is_append_only_and_reason_matches_outcome() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let store = PgStore::new(db.pool.clone());
    let entry = store
        .append_login(NewLogin::new(
            None,
            "nobody@agency.test",
            false,
            Some("invalid_credentials".to_string()),
        ))
        .await
        .unwrap();
    assert!(!entry.success);

    let delete = sqlx::query("DELETE FROM login_history WHERE id = $1")
        .bind(entry.id)
        .execute(&db.pool)
        .await;
    assert!(delete.is_err());

    let success_with_reason = sqlx::query(
        "INSERT INTO login_history (id, email, success, failure_reason)
         VALUES ($1, 'x@agency.test', true, 'invalid_credentials')",
    )
    .bind(Uuid::now_v7())
    .execute(&db.pool)
    .await;
    assert!(success_with_reason.is_err());

    let failure_without_reason = sqlx::query(
        "INSERT INTO login_history (id, email, success, failure_reason)
         VALUES ($1, 'x@agency.test', false, NULL)",
    )
    .bind(Uuid::now_v7())
    .execute(&db.pool)
    .await;
    assert!(failure_without_reason.is_err());

    common::cleanup(db).await;
}

// ── Profiles ────────────────────────────────────────────────────

#[tokio::test]
async fn profile_upsert_overwrites_existing_row() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let store = PgStore::new(db.pool.clone());
    let id = Uuid::now_v7();
    let profile = ProfileUpsert {
        id,
        email: "temp@agency.test".to_string(),
        full_name: "Temp".to_string(),
        company_name: Some("Acme Staffing".to_string()),
        phone: None,
        department: None,
        notes: None,
        status: AccountStatus::Pending,
        created_by: None,
    };
    store.upsert_profile(profile.clone()).await.unwrap();
    let updated = store
        .upsert_profile(ProfileUpsert {
            full_name: "Temp Worker".to_string(),
            status: AccountStatus::Active,
            ..profile
        })
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Temp Worker");
    assert_eq!(updated.status, AccountStatus::Active);

    let found = store.find_by_email("temp@agency.test").await.unwrap().unwrap();
    assert_eq!(found.id, id);

    common::cleanup(db).await;
}

// ── Local identities ────────────────────────────────────────────

#[tokio::test]
async fn local_identity_rejects_duplicate_email() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let identity = LocalIdentity::new(
        db.pool.clone(),
        SECRET.to_string(),
        chrono::Duration::minutes(5),
    );

    let id = identity
        .create_identity("lead@agency.test", "operator-pass-1")
        .await
        .unwrap();
    let err = identity
        .create_identity("  Lead@Agency.test ", "another-pass-1")
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::Duplicate), "got {err:?}");

    let session = identity
        .sign_in("lead@agency.test", "operator-pass-1")
        .await
        .unwrap();
    assert_eq!(session.account_id, id);
    assert_eq!(identity.verify_token(&session.access_token).await.unwrap(), id);

    let err = identity
        .sign_in("lead@agency.test", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidCredentials));

    common::cleanup(db).await;
}

// ── End to end ──────────────────────────────────────────────────

#[tokio::test]
async fn provisioning_over_postgres_records_role_and_activity() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let mut config = Config::in_memory(SECRET);
    config.storage = StorageBackend::Postgres;
    config.database_url = Some(db.url.clone());
    let state = AppState::new(
        config.clone(),
        Backends::postgres(db.pool.clone(), &config).unwrap(),
    );
    state
        .provisioner
        .bootstrap_super_admin(common::ROOT_EMAIL, common::ROOT_PASSWORD)
        .await
        .unwrap()
        .expect("super admin already present");

    let addr = common::serve(state).await;
    let client = reqwest::Client::new();
    let url = |path: &str| format!("http://{addr}{path}");

    let session: Value = client
        .post(url("/api/v1/auth/login"))
        .json(&json!({ "email": common::ROOT_EMAIL, "password": common::ROOT_PASSWORD }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let root = session["access_token"].as_str().unwrap().to_string();

    let resp = client
        .post(url("/api/v1/admin/users"))
        .bearer_auth(&root)
        .json(&json!({
            "email": "recruiter@agency.test",
            "password": "operator-pass-1",
            "full_name": "Recruiter",
            "role": "admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let user_id: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();

    let store = PgStore::new(db.pool.clone());
    let rows = store.assignments_for(user_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role, Role::Admin);

    let activity: Value = client
        .get(url("/api/v1/admin/activity?limit=1"))
        .bearer_auth(&root)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(activity[0]["action"], "created_user");
    assert_eq!(activity[0]["entity_id"], body["user"]["id"]);

    let resp = client
        .post(url("/api/v1/admin/users"))
        .bearer_auth(&root)
        .json(&json!({
            "email": "RECRUITER@agency.test",
            "password": "operator-pass-1",
            "full_name": "Recruiter Again",
            "role": "user",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    common::cleanup(db).await;
}
