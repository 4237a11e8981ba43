//! API error handling
//!
//! Every failed request answers with a JSON array of `{code, message, field?}`
//! objects. Internal failures are logged here and reach the client only as a
//! generic `INTERNAL_ERROR`.

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Closed set of error codes exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParsingError,
    InvalidSchema,
    InvalidField,
    MissingField,
    AlreadyExists,
    IncorrectCredentials,
    UnauthorizedAccess,
    CurrentUserSuspended,
    InternalError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ParsingError | ErrorCode::InvalidSchema => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidField | ErrorCode::MissingField | ErrorCode::AlreadyExists => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::IncorrectCredentials | ErrorCode::UnauthorizedAccess => {
                StatusCode::UNAUTHORIZED
            }
            ErrorCode::CurrentUserSuspended => StatusCode::FORBIDDEN,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Request field the error refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::UnauthorizedAccess, "Authentication required")
    }

    pub fn suspended() -> Self {
        Self::new(ErrorCode::CurrentUserSuspended, "Current user is suspended")
    }

    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError, "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Client-facing errors; all entries share the status of the first one
    Api(Vec<ApiError>),
    /// Anything unexpected; the message is logged, never returned
    Internal(String),
}

impl AppError {
    pub fn single(error: ApiError) -> Self {
        AppError::Api(vec![error])
    }

    pub fn unauthorized() -> Self {
        Self::single(ApiError::unauthorized())
    }

    pub fn suspended() -> Self {
        Self::single(ApiError::suspended())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let errors = match self {
            AppError::Api(errors) if !errors.is_empty() => errors,
            AppError::Api(_) => {
                tracing::error!("Empty error list reached the response layer");
                vec![ApiError::internal_error()]
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                vec![ApiError::internal_error()]
            }
        };

        let status = errors[0].code.status();
        (status, Json(errors)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AlreadyExists { field } => AppError::single(
                ApiError::new(ErrorCode::AlreadyExists, format!("{field} already exists"))
                    .with_field(field),
            ),
            AuthError::IncorrectCredentials => AppError::single(ApiError::new(
                ErrorCode::IncorrectCredentials,
                "Incorrect login or password",
            )),
            AuthError::InvalidField { field, message } => AppError::single(
                ApiError::new(ErrorCode::InvalidField, message).with_field(field),
            ),
            AuthError::Unauthorized => AppError::unauthorized(),
            AuthError::Suspended => AppError::suspended(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
