use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{IdentityError, IdentityProvider, Session, normalize_email};

/// Client for a hosted auth service exposing an admin user API.
pub struct HostedIdentity {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct UserBody {
    id: Uuid,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    expires_in: i64,
    user: UserBody,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default, alias = "msg", alias = "error_description")]
    message: Option<String>,
}

impl HostedIdentity {
    pub fn new(base_url: &str, service_key: String) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build identity client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    async fn error_message(resp: reqwest::Response) -> String {
        let status = resp.status();
        let body: ErrorBody = resp.json().await.unwrap_or_default();
        body.message.unwrap_or_else(|| format!("status {status}"))
    }
}

fn transport_error(err: reqwest::Error) -> IdentityError {
    IdentityError::Unavailable(err.to_string())
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let resp = self
            .client
            .post(self.url("/admin/users"))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({
                "email": normalize_email(email),
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status.is_success() {
            let user: UserBody = resp.json().await.map_err(transport_error)?;
            return Ok(user.id);
        }

        let message = Self::error_message(resp).await;
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(message));
        }
        if status == StatusCode::CONFLICT
            || status == StatusCode::UNPROCESSABLE_ENTITY
            || message.to_lowercase().contains("already")
        {
            return Err(IdentityError::Duplicate);
        }
        Err(IdentityError::Rejected(message))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let resp = self
            .client
            .post(self.url("/token?grant_type=password"))
            .header("apikey", &self.service_key)
            .json(&json!({ "email": normalize_email(email), "password": password }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(Self::error_message(resp).await));
        }
        if !status.is_success() {
            return Err(IdentityError::InvalidCredentials);
        }

        let token: TokenBody = resp.json().await.map_err(transport_error)?;
        Ok(Session {
            access_token: token.access_token,
            token_type: "bearer",
            expires_in: token.expires_in,
            account_id: token.user.id,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<Uuid, IdentityError> {
        let resp = self
            .client
            .get(self.url("/user"))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        match resp.status() {
            s if s.is_success() => {
                let user: UserBody = resp.json().await.map_err(transport_error)?;
                Ok(user.id)
            }
            s if s.is_server_error() => {
                Err(IdentityError::Unavailable(Self::error_message(resp).await))
            }
            _ => Err(IdentityError::InvalidToken),
        }
    }
}
