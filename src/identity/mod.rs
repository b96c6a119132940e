//! External identity layer.
//!
//! Owns credentials and session tokens. Everything else in the crate only
//! ever sees the account id an identity resolves to.

pub mod hosted;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::jwt::{Claims, encode_token};

pub use hosted::HostedIdentity;
pub use local::LocalIdentity;
pub use memory::MemoryIdentity;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("A user with this email already exists")]
    Duplicate,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub account_id: Uuid,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an auto-confirmed identity and return its account id.
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;
    /// Resolve a bearer token to the account id it was issued for.
    async fn verify_token(&self, token: &str) -> Result<Uuid, IdentityError>;
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Sign a session token for backends that issue their own tokens.
pub(crate) fn issue_session(
    account_id: Uuid,
    email: &str,
    secret: &str,
    ttl: Duration,
) -> Result<Session, IdentityError> {
    let claims = Claims::new(account_id, email, ttl);
    let access_token = encode_token(&claims, secret).map_err(IdentityError::Rejected)?;
    Ok(Session {
        access_token,
        token_type: "bearer",
        expires_in: ttl.num_seconds(),
        account_id,
    })
}
