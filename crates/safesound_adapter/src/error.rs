#![forbid(unsafe_code)]

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use safesound_os::ingest::IngestError;
use safesound_storage::repo::StorageError;
use serde::Serialize;

/// HTTP-facing error. Every variant carries a stable machine code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("{message}")]
    Unprocessable { code: &'static str, message: String },
    #[error("{resource_type} {id} not found")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },
    #[error("{message}")]
    InvalidState {
        message: String,
        current_state: String,
    },
    #[error("{message}")]
    ServiceUnavailable { code: &'static str, message: String },
    #[error("{message}")]
    Internal { code: &'static str, message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: "INVALID_REQUEST",
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { code, .. }
            | Self::Unprocessable { code, .. }
            | Self::ServiceUnavailable { code, .. }
            | Self::Internal { code, .. } => *code,
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_TRANSITION",
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            IngestError::InvalidRequest(_) => Self::BadRequest { code, message },
            IngestError::InvalidClassification(_) => Self::Unprocessable { code, message },
            IngestError::ClassificationServiceUnavailable(_) => {
                Self::ServiceUnavailable { code, message }
            }
            IngestError::PersistenceError(_) => Self::Internal { code, message },
            IngestError::UserNotFound(id) => Self::NotFound {
                resource_type: "user",
                id: id.to_string(),
            },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::NotFound { key, .. } => Self::NotFound {
                resource_type: "alert",
                id: key,
            },
            StorageError::InvalidTransition { from, .. } => Self::InvalidState {
                message,
                current_state: from.as_str().to_string(),
            },
            StorageError::DuplicateKey { .. } => Self::InvalidState {
                message,
                current_state: "exists".to_string(),
            },
            StorageError::ContractViolation(_) => Self::Unprocessable {
                code: "INVALID_REQUEST",
                message,
            },
            StorageError::Unavailable { .. } => Self::Internal {
                code: "PERSISTENCE_ERROR",
                message,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::warn!(error = %self, code = self.error_code(), "request rejected");
        }
        let current_state = match &self {
            Self::InvalidState { current_state, .. } => Some(current_state.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            status: "error",
            code: self.error_code(),
            message: self.to_string(),
            current_state,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use safesound_contracts::alert::AlertStatus;
    use safesound_contracts::user::UserId;

    #[test]
    fn at_api_error_01_ingest_errors_map_to_status() {
        let cases = [
            (IngestError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            (
                IngestError::InvalidClassification("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_CLASSIFICATION",
            ),
            (
                IngestError::ClassificationServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "CLASSIFICATION_SERVICE_UNAVAILABLE",
            ),
            (
                IngestError::PersistenceError(StorageError::Unavailable {
                    table: "alerts",
                    detail: "x".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
            ),
            (
                IngestError::UserNotFound(UserId::new("u9").unwrap()),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status_code(), status);
            assert_eq!(api.error_code(), code);
        }
    }

    #[test]
    fn at_api_error_02_invalid_transition_is_conflict() {
        let api = ApiError::from(StorageError::InvalidTransition {
            table: "alerts",
            key: "alert_00000001".into(),
            from: AlertStatus::Resolved,
            to: AlertStatus::Dismissed,
        });
        assert_eq!(api.status_code(), StatusCode::CONFLICT);
        assert!(matches!(api, ApiError::InvalidState { ref current_state, .. } if current_state == "resolved"));
        assert_eq!(api.into_response().status(), StatusCode::CONFLICT);
    }
}
