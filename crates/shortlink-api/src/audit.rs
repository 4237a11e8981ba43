//! Security audit logging for authentication events
//!
//! Structured records for sign-up, sign-in, sign-out, refresh, password
//! changes and rejected credentials. All events are logged at INFO level
//! with the "audit" target so they can be filtered and routed apart from
//! application logs.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    SignUpSuccess {
        user_id: String,
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignUpFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignInSuccess {
        user_id: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed sign-in; `login` is what the client typed, not a resolved user
    SignInFailure {
        login: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignOut {
        user_id: String,
        ip_address: Option<String>,
    },

    /// Token pair rotated through a refresh token
    TokenRefresh {
        user_id: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    PasswordChange {
        user_id: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Missing, malformed, expired or revoked token
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },

    /// Suspended account presented otherwise acceptable credentials
    SuspendedAccess {
        user_id: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },
}

impl AuditEvent {
    fn description(&self) -> &'static str {
        match self {
            AuditEvent::SignUpSuccess { .. } => "User signed up",
            AuditEvent::SignUpFailure { .. } => "Sign-up failed",
            AuditEvent::SignInSuccess { .. } => "Sign-in successful",
            AuditEvent::SignInFailure { .. } => "Sign-in failed",
            AuditEvent::SignOut { .. } => "User signed out",
            AuditEvent::TokenRefresh { .. } => "Token pair refreshed",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::SuspendedAccess { .. } => "Suspended user denied",
        }
    }

    /// Account the event is about, when one is known
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuditEvent::SignUpSuccess { user_id, .. }
            | AuditEvent::SignInSuccess { user_id, .. }
            | AuditEvent::SignOut { user_id, .. }
            | AuditEvent::TokenRefresh { user_id, .. }
            | AuditEvent::PasswordChange { user_id, .. }
            | AuditEvent::SuspendedAccess { user_id, .. } => Some(user_id.as_str()),
            AuditEvent::SignUpFailure { .. }
            | AuditEvent::SignInFailure { .. }
            | AuditEvent::InvalidToken { .. } => None,
        }
    }

    pub fn ip_address(&self) -> Option<&str> {
        let ip = match self {
            AuditEvent::SignUpSuccess { ip_address, .. }
            | AuditEvent::SignUpFailure { ip_address, .. }
            | AuditEvent::SignInSuccess { ip_address, .. }
            | AuditEvent::SignInFailure { ip_address, .. }
            | AuditEvent::SignOut { ip_address, .. }
            | AuditEvent::TokenRefresh { ip_address, .. }
            | AuditEvent::PasswordChange { ip_address, .. }
            | AuditEvent::InvalidToken { ip_address, .. }
            | AuditEvent::SuspendedAccess { ip_address, .. } => ip_address,
        };
        ip.as_deref()
    }

    fn reason(&self) -> Option<&str> {
        match self {
            AuditEvent::SignUpFailure { reason, .. }
            | AuditEvent::SignInFailure { reason, .. }
            | AuditEvent::InvalidToken { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }
}

/// Log a security audit event
///
/// The common fields are emitted individually; the full event is attached
/// as a JSON string so log aggregators can index it without knowing every
/// variant.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        user_id = event.user_id(),
        ip_address = event.ip_address(),
        reason = event.reason(),
        "{}",
        event.description()
    );
}

/// Client IP as reported by a reverse proxy
///
/// The first `X-Forwarded-For` entry wins over `X-Real-IP`. Connection info
/// is not available here, so `None` means no proxy header was present.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::to_string)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::USER_AGENT.as_str()).map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::SignInSuccess {
            user_id: "u1".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"sign_in_success\""));
        assert!(json.contains("u1"));
    }

    #[test]
    fn test_event_accessors() {
        let event = AuditEvent::SignOut {
            user_id: "u1".to_string(),
            ip_address: Some("10.0.0.1".to_string()),
        };
        assert_eq!(event.user_id(), Some("u1"));
        assert_eq!(event.ip_address(), Some("10.0.0.1"));
        assert_eq!(event.reason(), None);

        let event = AuditEvent::InvalidToken {
            ip_address: None,
            user_agent: None,
            reason: "expired".to_string(),
        };
        assert_eq!(event.user_id(), None);
        assert_eq!(event.reason(), Some("expired"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::SignInFailure {
            login: "kenplix".to_string(),
            reason: "Incorrect login or password".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Test Agent".to_string()),
        });
        audit_log(&AuditEvent::SuspendedAccess {
            user_id: "u1".to_string(),
            ip_address: None,
            user_agent: None,
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            "Mozilla/5.0 (Test)".parse().unwrap(),
        );

        assert_eq!(
            extract_user_agent(&headers),
            Some("Mozilla/5.0 (Test)".to_string())
        );
    }

    #[test]
    fn test_extract_missing_headers() {
        let headers = HeaderMap::new();

        assert_eq!(extract_ip_address(&headers), None);
        assert_eq!(extract_user_agent(&headers), None);
    }
}
