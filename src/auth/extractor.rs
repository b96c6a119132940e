use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::SharedState;

/// An authenticated caller. Carries identity only; roles are resolved per
/// request through the permission resolver.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub account_id: Uuid,
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;
    Ok(value.strip_prefix("Bearer ").map(|t| t.trim().to_string()))
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts)? {
            Some(token) => Some(token),
            None => CookieJar::from_headers(&parts.headers)
                .get("access_token")
                .map(|c| c.value().to_string()),
        };

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Err(AppError::Unauthorized(
                "Missing authentication token".to_string(),
            ));
        };

        let account_id = state.identity.verify_token(&token).await?;
        Ok(AuthUser { account_id })
    }
}
