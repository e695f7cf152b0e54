use axum::{Json, http::StatusCode, response::IntoResponse};
use tether_common::views::ApiErrorResponse;
use tether_db::storage::StoreError;
use tether_pce::PceError;
use thiserror::Error;

use crate::{auth::AuthError, enrollment::EnrollmentError};

const INTERNAL_MESSAGE: &str = "Something went wrong on our end. Please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    External(#[from] PceError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::External(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::NameTaken => Self::conflict(err.to_string()),
            EnrollmentError::Controller(e) => Self::External(e),
            EnrollmentError::Storage(e) => Self::Storage(e),
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownAgent => Self::not_found(err.to_string()),
            AuthError::MissingCredential | AuthError::InvalidCredential => {
                Self::forbidden(err.to_string())
            }
            AuthError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(err: ApiError) -> Self {
        let (code, message) = match &err {
            ApiError::BadRequest(m) => ("BadRequest", m.clone()),
            ApiError::Conflict(m) => ("Conflict", m.clone()),
            ApiError::Forbidden(m) => ("Forbidden", m.clone()),
            ApiError::NotFound(m) => ("NotFound", m.clone()),
            ApiError::External(e) if e.is_retryable() => (
                "ServiceUnavailable",
                "The policy controller did not answer in time. Please retry later.".into(),
            ),
            ApiError::External(_) => (
                "ExternalServiceError",
                "The policy controller could not complete the request.".into(),
            ),
            ApiError::Storage(StoreError::NotFound) => (
                "NotFound",
                "The requested resource was not found.".into(),
            ),
            ApiError::Storage(_) => ("InternalError", INTERNAL_MESSAGE.into()),
        };

        ApiErrorResponse {
            code: Some(code.into()),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            tracing::error!("Error returned by handler: {self}");
        } else {
            tracing::info!("Request rejected: {self}");
        }

        (status_code, Json(Into::<ApiErrorResponse>::into(self))).into_response()
    }
}
