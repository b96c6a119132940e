use async_trait::async_trait;
use chrono::Duration;
use sqlx::PgPool;
use uuid::Uuid;

use super::{IdentityError, IdentityProvider, Session, issue_session, normalize_email};
use crate::auth::{jwt, password};

/// Identities kept in the service's own Postgres database.
pub struct LocalIdentity {
    pool: PgPool,
    jwt_secret: String,
    token_ttl: Duration,
}

impl LocalIdentity {
    pub fn new(pool: PgPool, jwt_secret: String, token_ttl: Duration) -> Self {
        Self {
            pool,
            jwt_secret,
            token_ttl,
        }
    }
}

fn map_db_error(err: sqlx::Error) -> IdentityError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            IdentityError::Duplicate
        }
        other => IdentityError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let pw_hash =
            password::hash(password).map_err(|e| IdentityError::Rejected(e.to_string()))?;

        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO identities (id, email, password_hash, email_confirmed_at)
             VALUES ($1, $2, $3, now()) RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(normalize_email(email))
        .bind(pw_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email);
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, password_hash FROM identities WHERE email = $1")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        let (id, stored) = row.ok_or(IdentityError::InvalidCredentials)?;
        let valid = password::verify(password, &stored)
            .map_err(|e| IdentityError::Unavailable(format!("stored hash unreadable: {e}")))?;
        if !valid {
            return Err(IdentityError::InvalidCredentials);
        }

        issue_session(id, &email, &self.jwt_secret, self.token_ttl)
    }

    async fn verify_token(&self, token: &str) -> Result<Uuid, IdentityError> {
        jwt::decode_token(token, &self.jwt_secret)
            .map(|claims| claims.sub)
            .map_err(|_| IdentityError::InvalidToken)
    }
}
