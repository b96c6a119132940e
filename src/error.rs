use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::db::StoreError;
use crate::identity::IdentityError;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    /// No caller token, or a token the identity layer does not accept.
    Unauthorized(String),
    /// Caller is authenticated but its role does not allow the operation.
    Forbidden(String),
    /// Malformed or missing request fields.
    BadRequest(String),
    Conflict(String),
    RateLimited(String),
    /// The identity layer refused or could not be reached. The message is
    /// already sanitised for the caller.
    Dependency(StatusCode, String),
    Internal(String),
    Store(StoreError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {msg}"),
            AppError::Dependency(status, msg) => write!(f, "Dependency Failure ({status}): {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Store(err) => write!(f, "Store Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            AppError::Dependency(status, msg) => (*status, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Store(err) => {
                tracing::error!("Store error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Not found".to_string()),
            StoreError::Conflict(detail) => {
                tracing::warn!(%detail, "Store rejected conflicting write");
                AppError::Conflict("Record already exists".to_string())
            }
            other => AppError::Store(other),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken => {
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
            IdentityError::InvalidCredentials => {
                AppError::Unauthorized("Invalid credentials".to_string())
            }
            IdentityError::Duplicate => AppError::Dependency(
                StatusCode::BAD_REQUEST,
                "A user with this email already exists".to_string(),
            ),
            IdentityError::Rejected(detail) => {
                tracing::warn!(%detail, "Identity provider rejected request");
                AppError::Dependency(
                    StatusCode::BAD_REQUEST,
                    "Identity provider rejected the request".to_string(),
                )
            }
            IdentityError::Unavailable(detail) => {
                tracing::error!(%detail, "Identity provider unavailable");
                AppError::Dependency(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Identity provider unavailable".to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conflict_detail_is_not_sent_to_the_caller() {
        let err = AppError::from(StoreError::Conflict(
            "duplicate key value violates unique constraint \"role_assignments_account_id_key\""
                .to_string(),
        ));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Record already exists");
    }
}
