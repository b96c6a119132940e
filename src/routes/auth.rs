use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::client_ip::{ClientInfo, client_info};
use crate::db::AccountStore;
use crate::error::AppError;
use crate::identity::{IdentityError, Session, normalize_email};
use crate::models::{AccountStatus, NewLogin};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn session_cookie(access_token: &str) -> CookieJar {
    let access = Cookie::build(("access_token", access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();
    CookieJar::new().add(access)
}

async fn record_attempt(
    state: &SharedState,
    client: &ClientInfo,
    account_id: Option<Uuid>,
    email: &str,
    failure: Option<&str>,
) {
    let login = NewLogin::new(
        account_id,
        email,
        failure.is_none(),
        failure.map(str::to_string),
    )
    .with_client(client.ip_address.clone(), client.user_agent.clone());
    state.audit.record_login(login).await;
}

/// Account id for an email, when a profile exists. Used to attach failed
/// attempts to the account they targeted.
async fn known_account(state: &SharedState, email: &str) -> Option<Uuid> {
    match state.accounts.find_by_email(email).await {
        Ok(account) => account.map(|a| a.id),
        Err(e) => {
            tracing::warn!(%email, error = %e, "Account lookup for login history failed");
            None
        }
    }
}

pub async fn login(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<Session>), AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let client = client_info(&headers, Some(addr.ip()), &state.config.trusted_proxies);

    if state.login_limiter.check(&email).is_err() {
        let account_id = known_account(&state, &email).await;
        record_attempt(&state, &client, account_id, &email, Some("rate_limited")).await;
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let session = match state.identity.sign_in(&email, &req.password).await {
        Ok(session) => session,
        Err(err) => {
            let reason = match err {
                IdentityError::InvalidCredentials => {
                    state.login_limiter.record_failure(&email);
                    "invalid_credentials"
                }
                IdentityError::Unavailable(_) => "identity_unavailable",
                _ => "identity_rejected",
            };
            let account_id = known_account(&state, &email).await;
            record_attempt(&state, &client, account_id, &email, Some(reason)).await;
            return Err(err.into());
        }
    };

    let account_id = session.account_id;
    let account = match state.accounts.find_by_id(account_id).await {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!(%account_id, error = %e, "Profile lookup during login failed");
            record_attempt(&state, &client, Some(account_id), &email, Some("profile_unavailable"))
                .await;
            return Err(e.into());
        }
    };

    if account
        .as_ref()
        .is_some_and(|a| a.status == AccountStatus::Suspended)
    {
        record_attempt(&state, &client, Some(account_id), &email, Some("account_suspended")).await;
        return Err(AppError::Forbidden("Account suspended".to_string()));
    }

    if account.is_some() {
        if let Err(e) = state.accounts.touch_last_login(account_id, Utc::now()).await {
            tracing::warn!(%account_id, error = %e, "Failed to update last login");
        }
    }
    state.login_limiter.reset(&email);
    record_attempt(&state, &client, Some(account_id), &email, None).await;
    tracing::info!(%account_id, "Signed in");

    let jar = session_cookie(&session.access_token);
    Ok((jar, Json(session)))
}
