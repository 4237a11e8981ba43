//! Identity middleware for protected routes
//!
//! `identity_middleware` turns an `Authorization: Bearer <token>` header into
//! the current [`User`], stored in request extensions. Handlers extract it
//! with `Extension<User>`. `prolong_session_middleware` runs after it on
//! routes that count as session activity.

use super::service::AuthError;
use super::session::TokenKind;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use shortlink_core::User;
use std::sync::Arc;

/// Bearer credential from the Authorization header
///
/// The header must consist of exactly two space-separated fields,
/// `Bearer` and the token.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Authenticate the request or reject it
///
/// Missing, malformed, expired or revoked tokens give 401. A suspended
/// account gives 403 even when its token is live.
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let parsed = match bearer_token(request.headers()) {
        Some(token) => state.jwt.parse_access_token(token).map_err(|e| e.to_string()),
        None => Err("Missing or malformed Authorization header".to_string()),
    };

    let claims = match parsed {
        Ok(claims) => claims,
        Err(reason) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason,
            });
            return Err(AppError::unauthorized());
        }
    };

    let user = match state.auth.authenticate(TokenKind::Access, &claims).await {
        Ok(user) => user,
        Err(AuthError::Suspended) => {
            audit_log(&AuditEvent::SuspendedAccess {
                user_id: claims.sub,
                ip_address,
                user_agent,
            });
            return Err(AppError::suspended());
        }
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason: "Token is not live".to_string(),
            });
            return Err(e.into());
        }
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Slide the session idle deadline in the background
///
/// The prolong call is detached from the request and bounded by
/// `session.prolong_timeout_secs`; its outcome only shows up in logs.
pub async fn prolong_session_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(user) = request.extensions().get::<User>() {
        let user_id = user.id.clone();
        let jwt = state.jwt.clone();
        let timeout = state.config.session.prolong_timeout();

        tokio::spawn(async move {
            if tokio::time::timeout(timeout, jwt.prolong_tokens(&user_id))
                .await
                .is_err()
            {
                tracing::warn!(user_id = %user_id, "Timed out prolonging session");
            }
        });
    }

    next.run(request).await
}
