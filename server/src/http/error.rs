use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared_types::Envelope;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::storage::StorageError;

pub const AUTH_FAILED_MESSAGE: &str = "Invalid authentication token provided";

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(AuthError),
    Validation(String),
    NotFound(String),
    InternalError(String),
    StorageError(anyhow::Error),
}

impl ApiError {
    pub fn config_not_found(name: &str) -> Self {
        ApiError::NotFound(format!("Configuration '{name}' not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(err) => {
                warn!(error = %err, "Rejected unauthenticated write");
                (StatusCode::UNAUTHORIZED, AUTH_FAILED_MESSAGE.to_string())
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ApiError::StorageError(err) => {
                // Requests the store refused are the caller's fault
                if let Some(StorageError::InvalidName { .. }) = err.downcast_ref::<StorageError>() {
                    return ApiError::Validation(err.to_string()).into_response();
                }
                if let Some(object_store::Error::InvalidPath { .. }) =
                    err.downcast_ref::<object_store::Error>()
                {
                    return ApiError::Validation(format!("Rejected by store: {err}"))
                        .into_response();
                }

                error!(error = ?err, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Storage error: {err}"),
                )
            }
        };

        (status, Json(Envelope::<()>::failure(message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::StorageError(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
