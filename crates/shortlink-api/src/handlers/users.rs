//! Current user handlers

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{ChangePasswordRequest, UserInfo};
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::ValidatedJson;
use axum::{extract::State, http::HeaderMap, http::StatusCode, Extension, Json};
use shortlink_core::User;
use std::sync::Arc;

/// Profile of the authenticated user
pub async fn me_handler(Extension(user): Extension<User>) -> Json<UserInfo> {
    Json(UserInfo::from(user))
}

/// Change the password of the authenticated user
///
/// Ends the current session; the client has to sign in again.
///
/// # Responses
///
/// * `204 No Content` - Password changed
/// * `422 Unprocessable Entity` - Current password is wrong or the new one is too weak
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<User>,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state.auth.change_password(&user.id, request).await?;

    audit_log(&AuditEvent::PasswordChange {
        user_id: user.id,
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(StatusCode::NO_CONTENT)
}
