use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("statistics unavailable")]
    StatsUnavailable(#[source] Box<AppError>),
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            AppError::StorageUnavailable(err) => {
                tracing::error!(error = %err, "storage operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_unavailable",
                    "A storage error occurred".to_owned(),
                )
            }
            AppError::StatsUnavailable(err) => {
                tracing::error!(error = %err, "statistics computation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "stats_unavailable",
                    "Failed to get statistics".to_owned(),
                )
            }
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "bad_request", message.to_owned())
            }
        };

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message: msg },
            }),
        )
            .into_response()
    }
}
