use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::MessageResponse;

/// ApiError
///
/// The failure taxonomy of the identity core. Every variant is terminal for the
/// request that produced it and renders as `{ "success": false, "message": ... }`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Duplicate registration.
    #[error("{0}")]
    Conflict(&'static str),
    /// Missing, invalid or expired token, or bad credentials. Deliberately coarse.
    #[error("{0}")]
    Unauthenticated(&'static str),
    /// Valid session, wrong role (or unapproved principal).
    #[error("{0}")]
    Forbidden(&'static str),
    /// The operation targets an email with no account.
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Invalid OTP")]
    InvalidCode,
    #[error("OTP expired")]
    ExpiredCode,
    /// Malformed or incomplete request payload.
    #[error("{0}")]
    Validation(String),
    /// Storage, hashing or signing failure. The detail is logged, never returned.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Conflict(_)
            | ApiError::InvalidCode
            | ApiError::ExpiredCode
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Unexpected(detail) => {
                tracing::error!(detail = %detail, "request failed unexpectedly");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(MessageResponse::failure(message))).into_response()
    }
}

/// Body rejections (bad syntax, wrong content type, wrong field types) become
/// validation failures so they share the JSON error envelope.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// ApiJson
///
/// `Json` with `ApiError` as its rejection. Every handler that takes a body uses
/// this instead of `axum::Json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// StoreError
///
/// Failures reported by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate key")]
    Duplicate,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => ApiError::Conflict("Email already exists"),
            StoreError::Backend(detail) => ApiError::Unexpected(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::Conflict("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthenticated("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InvalidCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ExpiredCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Unexpected("db down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn unexpected_errors_hide_their_detail() {
        let response = ApiError::Unexpected("connection refused on 10.0.0.4".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected_as_validation_errors() {
        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();

        let err = ApiJson::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn duplicate_store_errors_become_conflicts() {
        let err: ApiError = StoreError::Duplicate.into();
        assert_eq!(err, ApiError::Conflict("Email already exists"));
    }
}
