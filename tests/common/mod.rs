use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use staffdesk_access::config::Config;
use staffdesk_access::db::MemoryStore;
use staffdesk_access::identity::MemoryIdentity;
use staffdesk_access::state::{AppState, Backends};

pub const ROOT_EMAIL: &str = "root@agency.test";
pub const ROOT_PASSWORD: &str = "root-password-123";

/// A running test server over in-memory backends.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<MemoryIdentity>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Login and return the response body + status.
    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Sign in and return the access token.
    pub async fn token_for(&self, email: &str, password: &str) -> String {
        let (body, status) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Access token of the bootstrapped super admin.
    pub async fn root_token(&self) -> String {
        self.token_for(ROOT_EMAIL, ROOT_PASSWORD).await
    }

    /// Provision an operator through the API, return the created user JSON.
    pub async fn create_user(&self, token: &str, email: &str, role: &str) -> Value {
        let (body, status) = self
            .post_auth(
                "/api/v1/admin/users",
                token,
                &json!({
                    "email": email,
                    "password": "operator-pass-1",
                    "full_name": "Test Operator",
                    "role": role,
                    "company_name": "Acme Staffing",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create user failed: {body}");
        body["user"].clone()
    }

    /// Make an authenticated GET request.
    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated POST request with JSON body.
    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated PUT request with JSON body.
    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

/// Spawn a test app with fresh in-memory stores and a bootstrapped super admin.
pub async fn spawn_app() -> TestApp {
    let config = Config::in_memory("test-jwt-secret-that-is-long-enough");

    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(MemoryIdentity::new(
        config.jwt_secret.clone(),
        config.token_ttl,
    ));
    let state = AppState::new(
        config,
        Backends::with_identity(store.clone(), identity.clone()),
    );

    state
        .provisioner
        .bootstrap_super_admin(ROOT_EMAIL, ROOT_PASSWORD)
        .await
        .expect("bootstrap failed")
        .expect("super admin already present");

    let addr = serve(state).await;
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        store,
        identity,
    }
}

/// Serve the app on a random local port and return its address.
pub async fn serve(state: staffdesk_access::state::SharedState) -> SocketAddr {
    let app = staffdesk_access::build_app(state);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    addr
}

/// A dedicated, migrated Postgres database for one test.
#[allow(dead_code)]
pub struct TestDb {
    pub pool: PgPool,
    pub url: String,
    pub db_name: String,
}

fn with_database(base_url: &str, db_name: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.to_string())
}

/// Create and migrate a fresh database. Returns `None` when `DATABASE_URL`
/// is not set, so Postgres tests are skipped on machines without one.
#[allow(dead_code)]
pub async fn test_db() -> Option<TestDb> {
    let _ = dotenvy::dotenv();
    let Ok(base_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    // Create a unique test database
    let db_name = format!(
        "staffdesk_test_{}",
        Uuid::now_v7().to_string().replace('-', "")
    );

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&with_database(&base_url, "postgres"))
        .await
        .expect("Failed to connect to postgres for test DB creation");
    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");
    admin_pool.close().await;

    let url = with_database(&base_url, &db_name);
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    Some(TestDb { pool, url, db_name })
}

/// Drop the test database after a test completes.
#[allow(dead_code)]
pub async fn cleanup(db: TestDb) {
    db.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    if let Ok(admin_pool) = PgPoolOptions::new()
        .max_connections(2)
        .connect(&with_database(&base_url, "postgres"))
        .await
    {
        let _ = sqlx::query(&format!(
            "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
            db.db_name
        ))
        .execute(&admin_pool)
        .await;
        admin_pool.close().await;
    }
}
