//! 接口层错误

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use mt_core::error::ErrorCategory;
use mt_core::MutinyError;

/// 服务器启动错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// HTTP 错误响应
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                message: message.into(),
            },
        }
    }

    pub fn usage_unavailable() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "usage_unavailable",
            "judgment usage is not metered",
        )
    }

    pub fn missing_session() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "missing_session",
            "x-session-id header is required",
        )
    }
}

pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::ExternalUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<MutinyError> for ApiError {
    fn from(err: MutinyError) -> Self {
        let status = status_for(err.category());
        if status.is_server_error() {
            tracing::warn!(code = err.code(), error = %err, "Request failed");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_core::ids::GameId;

    #[test]
    fn test_category_status_mapping() {
        assert_eq!(
            ApiError::from(MutinyError::NotYourTurn).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(MutinyError::GameNotFound(GameId::new())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(MutinyError::ConcurrencyConflict { expected: 1, actual: 2 }).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(MutinyError::ExternalUnavailable("oracle".into())).status,
            StatusCode::SERVICE_UNAVAILABLE
        );

        let err = ApiError::from(MutinyError::GameFull);
        assert_eq!(err.body.error, "game_full");
    }
}
