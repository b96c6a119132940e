use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{IdentityError, IdentityProvider, Session, issue_session, normalize_email};
use crate::auth::{jwt, password};

/// In-process identities keyed by normalized email.
pub struct MemoryIdentity {
    identities: DashMap<String, (Uuid, String)>,
    jwt_secret: String,
    token_ttl: Duration,
    unavailable: AtomicBool,
}

impl MemoryIdentity {
    pub fn new(jwt_secret: String, token_ttl: Duration) -> Self {
        Self {
            identities: DashMap::new(),
            jwt_secret,
            token_ttl,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    fn check(&self) -> Result<(), IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(IdentityError::Unavailable("identity backend switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        self.check()?;
        let pw_hash =
            password::hash(password).map_err(|e| IdentityError::Rejected(e.to_string()))?;

        // The entry lock makes check-and-insert atomic per email.
        match self.identities.entry(normalize_email(email)) {
            Entry::Occupied(_) => Err(IdentityError::Duplicate),
            Entry::Vacant(slot) => {
                let id = Uuid::now_v7();
                slot.insert((id, pw_hash));
                Ok(id)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.check()?;
        let email = normalize_email(email);
        let (id, stored) = self
            .identities
            .get(&email)
            .map(|entry| entry.value().clone())
            .ok_or(IdentityError::InvalidCredentials)?;

        let valid = password::verify(password, &stored)
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        if !valid {
            return Err(IdentityError::InvalidCredentials);
        }

        issue_session(id, &email, &self.jwt_secret, self.token_ttl)
    }

    async fn verify_token(&self, token: &str) -> Result<Uuid, IdentityError> {
        self.check()?;
        jwt::decode_token(token, &self.jwt_secret)
            .map(|claims| claims.sub)
            .map_err(|_| IdentityError::InvalidToken)
    }
}
