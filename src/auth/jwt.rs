use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session token claims. Deliberately role-free: authorization is always
/// resolved from role assignments, never from what a token says.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(account_id: Uuid, email: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: account_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("JWT decode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let claims = Claims::new(Uuid::now_v7(), "a@b.com", Duration::minutes(5));
        let token = encode_token(&claims, "secret-one").unwrap();
        assert!(decode_token(&token, "secret-two").is_err());
        assert_eq!(decode_token(&token, "secret-one").unwrap().sub, claims.sub);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims::new(Uuid::now_v7(), "a@b.com", Duration::minutes(-10));
        let token = encode_token(&claims, "secret").unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }
}
