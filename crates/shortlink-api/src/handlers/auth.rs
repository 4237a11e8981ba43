//! Authentication API handlers
//!
//! Sign-up, sign-in, token refresh and sign-out.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{AuthError, RefreshRequest, SignInRequest, SignUpRequest, TokenPair, UserInfo};
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::ValidatedJson;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use shortlink_core::User;
use std::sync::Arc;

/// Register a new user account
///
/// # Responses
///
/// * `201 Created` - The new user
/// * `400 Bad Request` - Body is not valid JSON for this schema
/// * `422 Unprocessable Entity` - Field validation failed or email/username taken
pub async fn sign_up_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);
    let username = request.username.clone();

    match state.auth.sign_up(request).await {
        Ok(user) => {
            audit_log(&AuditEvent::SignUpSuccess {
                user_id: user.id.clone(),
                username: user.username.clone(),
                ip_address,
                user_agent,
            });
            Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
        }
        Err(e) => {
            if matches!(e, AuthError::AlreadyExists { .. }) {
                audit_log(&AuditEvent::SignUpFailure {
                    username,
                    reason: e.to_string(),
                    ip_address,
                    user_agent,
                });
            }
            Err(e.into())
        }
    }
}

/// Login with username or email
///
/// # Responses
///
/// * `200 OK` - `{accessToken, refreshToken}`
/// * `401 Unauthorized` - Incorrect login or password
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<SignInRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);
    let login = request.login.clone();

    match state.auth.sign_in(request).await {
        Ok((user, tokens)) => {
            audit_log(&AuditEvent::SignInSuccess {
                user_id: user.id,
                ip_address,
                user_agent,
            });
            Ok(Json(tokens))
        }
        Err(e) => {
            if matches!(e, AuthError::IncorrectCredentials) {
                audit_log(&AuditEvent::SignInFailure {
                    login,
                    reason: e.to_string(),
                    ip_address,
                    user_agent,
                });
            }
            Err(e.into())
        }
    }
}

/// Exchange a refresh token for a new pair
///
/// # Responses
///
/// * `200 OK` - New `{accessToken, refreshToken}`; the previous pair is revoked
/// * `401 Unauthorized` - Refresh token is no longer live
/// * `403 Forbidden` - The user is suspended
/// * `422 Unprocessable Entity` - Refresh token is malformed or expired
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let (user, tokens) = state.auth.refresh(&request.refresh_token).await?;

    audit_log(&AuditEvent::TokenRefresh {
        user_id: user.id,
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(Json(tokens))
}

/// End the current session
///
/// Both outstanding tokens stop working immediately.
pub async fn sign_out_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    state.auth.sign_out(&user.id).await?;

    audit_log(&AuditEvent::SignOut {
        user_id: user.id,
        ip_address: extract_ip_address(&headers),
    });

    Ok(StatusCode::NO_CONTENT)
}
