use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the session lifecycle and attach subsystem.
///
/// Every variant maps to exactly one HTTP status family; no variant leaks
/// internal detail to the caller beyond the small message string attached
/// to it.
#[derive(Error, Debug)]
pub enum SessionCtlError {
    /// Malformed or semantically invalid caller input.
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Missing or invalid principal.
    #[error("unauthorized")]
    Unauthorized,

    /// Session absent, or present but not owned by the caller.
    ///
    /// Deliberately indistinguishable from "absent" so the API never acts
    /// as an existence-oracle for sessions the caller doesn't own.
    #[error("session not found: {id}")]
    NotFound { id: String },

    /// Attach ownership mismatch, surfaced explicitly because the upgrade
    /// handshake cannot defer to a generic not-found.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Operation not valid in the session's current state.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Admission denied by tier quota.
    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// Store failure, backend failure, or codec invariant breach.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SessionCtlError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn quota_exceeded<S: Into<String>>(message: S) -> Self {
        Self::QuotaExceeded { message: message.into() }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::Conflict { .. } => "conflict",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for SessionCtlError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();
        let message = self.to_string();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error_type, message = %message, "session control error");
            }
            StatusCode::TOO_MANY_REQUESTS | StatusCode::CONFLICT => {
                tracing::warn!(error_type, message = %message, "session control error");
            }
            _ => {
                tracing::debug!(error_type, message = %message, "session control error");
            }
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

pub type SessionCtlResult<T> = Result<T, SessionCtlError>;
