use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

/// Errors surfaced at the HTTP boundary. Every variant maps to a stable `kind`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing or malformed credential")]
    MissingOrMalformedCredential,

    #[error("invalid or expired credential")]
    InvalidOrExpiredCredential,

    #[error("revoked or mismatched credential")]
    RevokedOrMismatchedCredential,

    #[error("access forbidden")]
    AccessForbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Unknown(#[source] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::MissingOrMalformedCredential => "missing_or_malformed_credential",
            AppError::InvalidOrExpiredCredential => "invalid_or_expired_credential",
            AppError::RevokedOrMismatchedCredential => "revoked_or_mismatched_credential",
            AppError::AccessForbidden => "access_forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unknown(_) => "unknown",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MissingOrMalformedCredential
            | AppError::InvalidOrExpiredCredential
            | AppError::RevokedOrMismatchedCredential => StatusCode::UNAUTHORIZED,
            AppError::AccessForbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unknown(e: impl Into<anyhow::Error>) -> Self {
        AppError::Unknown(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Unknown(source) = &self {
            error!(error = %format!("{source:#}"), "request failed");
        }
        let status = self.status();
        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => AppError::Conflict("resource already exists".into()),
            other => AppError::Unknown(other.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
