//! Request body binding and validation
//!
//! [`ValidatedJson`] deserializes a JSON body and runs its `validator`
//! rules. Failures are turned into API errors by the [`ValidationContext`]
//! held in application state, which is built once at startup.

use crate::error::{ApiError, AppError, ErrorCode};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use validator::{Validate, ValidationError, ValidationErrors};

/// Translates binding and validation failures into API errors
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    _private: (),
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a body extraction failure
    pub fn rejection(&self, rejection: JsonRejection) -> AppError {
        let error = match rejection {
            JsonRejection::JsonDataError(e) => {
                ApiError::new(ErrorCode::InvalidSchema, e.body_text())
            }
            JsonRejection::JsonSyntaxError(e) => {
                ApiError::new(ErrorCode::ParsingError, e.body_text())
            }
            JsonRejection::MissingJsonContentType(_) => ApiError::new(
                ErrorCode::ParsingError,
                "Expected request with `Content-Type: application/json`",
            ),
            other => ApiError::new(ErrorCode::ParsingError, other.body_text()),
        };
        AppError::single(error)
    }

    /// Map field validation failures, one entry per field, ordered by field
    pub fn translate(&self, errors: &ValidationErrors) -> AppError {
        let mut fields: Vec<(String, &ValidationError)> = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                let field: &str = &field;
                errs.first().map(|err| (to_camel_case(field), err))
            })
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let api_errors = fields
            .into_iter()
            .map(|(field, err)| {
                let code = if is_empty_value(err) {
                    ErrorCode::MissingField
                } else {
                    ErrorCode::InvalidField
                };
                let message = if code == ErrorCode::MissingField {
                    format!("{field} is required")
                } else {
                    self.message(err)
                };
                ApiError::new(code, message).with_field(field)
            })
            .collect();

        AppError::Api(api_errors)
    }

    fn message(&self, err: &ValidationError) -> String {
        if let Some(message) = &err.message {
            return message.to_string();
        }

        match err.code.as_ref() {
            "length" => {
                let min = err.params.get("min").and_then(|v| v.as_u64());
                let max = err.params.get("max").and_then(|v| v.as_u64());
                match (min, max) {
                    (Some(min), Some(max)) => {
                        format!("Must be between {min} and {max} characters long")
                    }
                    (Some(min), None) => format!("Must be at least {min} characters long"),
                    (None, Some(max)) => format!("Must be at most {max} characters long"),
                    (None, None) => "Invalid length".to_string(),
                }
            }
            "email" => "Must be a valid email address".to_string(),
            _ => "Invalid value".to_string(),
        }
    }
}

fn is_empty_value(err: &ValidationError) -> bool {
    matches!(err.params.get("value"), Some(serde_json::Value::String(s)) if s.is_empty())
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// JSON body that passed its validation rules
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T> FromRequest<Arc<AppState>> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| state.validation.rejection(rejection))?;

        value
            .validate()
            .map_err(|errors| state.validation.translate(&errors))?;

        Ok(Self(value))
    }
}
