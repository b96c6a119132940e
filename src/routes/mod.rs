pub mod admin;
pub mod auth;
pub mod me;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/v1/auth/login", post(auth::login))
        // Current caller
        .route("/api/v1/me", get(me::me))
        .route(
            "/api/v1/me/permissions/{permission}",
            get(me::has_permission),
        )
        // Admin
        .route(
            "/api/v1/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route("/api/v1/admin/users/{id}", put(admin::update_profile))
        .route("/api/v1/admin/users/{id}/role", put(admin::change_role))
        .route("/api/v1/admin/users/{id}/status", put(admin::set_status))
        .route("/api/v1/admin/stats", get(admin::stats))
        .route("/api/v1/admin/attention", get(admin::attention))
        .route("/api/v1/admin/activity", get(admin::activity))
        .route("/api/v1/admin/logins", get(admin::logins))
}
