//! Token/session orchestration
//!
//! `JwtService` pairs the access and refresh token managers with the
//! session cache. Every issuance writes the uids of the new pair under
//! `token:<user id>`, overwriting whatever was there, so a user has at most
//! one live pair at a time. A presented token is only accepted while its
//! uid is the one recorded for its kind.

use super::token::{Claims, TokenError, TokenManager};
use serde::{Deserialize, Serialize};
use shortlink_core::{CacheError, SessionCache};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const SESSION_KEY_PREFIX: &str = "token:";

#[derive(Debug, Error)]
pub enum JwtServiceError {
    #[error("Access token TTL ({access:?}) must be shorter than refresh token TTL ({refresh:?})")]
    TtlOrder { access: Duration, refresh: Duration },

    #[error("Sign-out timeout ({timeout:?}) must be positive and shorter than access token TTL ({access:?})")]
    SignOutTimeout { timeout: Duration, access: Duration },

    #[error("Session cache is not configured")]
    MissingCache,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Token is not the current one for this session")]
    StaleToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Session cache error: {0}")]
    Cache(CacheError),

    #[error("Session record error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CacheError> for JwtServiceError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound => JwtServiceError::SessionNotFound,
            other => JwtServiceError::Cache(other),
        }
    }
}

impl JwtServiceError {
    /// Whether the error means the presented token is simply no longer live
    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::SessionNotFound | Self::StaleToken)
    }
}

/// Which of the two token kinds a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Token pair handed to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Session record stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUids {
    #[serde(rename = "accessTokenUID")]
    pub access_token_uid: String,
    #[serde(rename = "refreshTokenUID")]
    pub refresh_token_uid: String,
}

impl TokenUids {
    fn uid(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_token_uid,
            TokenKind::Refresh => &self.refresh_token_uid,
        }
    }
}

fn session_key(user_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{user_id}")
}

/// Builder for [`JwtService`]
pub struct JwtServiceBuilder {
    access: TokenManager,
    refresh: TokenManager,
    cache: Option<Arc<dyn SessionCache>>,
    sign_out_timeout: Option<Duration>,
}

impl JwtServiceBuilder {
    pub fn cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Idle timeout for sessions; `None` keeps sessions alive for the refresh TTL
    pub fn sign_out_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sign_out_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<JwtService, JwtServiceError> {
        let access = self.access.ttl();
        let refresh = self.refresh.ttl();

        if access >= refresh {
            return Err(JwtServiceError::TtlOrder { access, refresh });
        }

        let sign_out_timeout = match self.sign_out_timeout {
            Some(timeout) if timeout.is_zero() || timeout >= access => {
                return Err(JwtServiceError::SignOutTimeout { timeout, access });
            }
            Some(timeout) => timeout,
            None => refresh,
        };

        let cache = self.cache.ok_or(JwtServiceError::MissingCache)?;

        Ok(JwtService {
            access: self.access,
            refresh: self.refresh,
            cache,
            sign_out_timeout,
        })
    }
}

/// Issues, validates, prolongs and revokes token pairs
pub struct JwtService {
    access: TokenManager,
    refresh: TokenManager,
    cache: Arc<dyn SessionCache>,
    sign_out_timeout: Duration,
}

impl JwtService {
    pub fn builder(access: TokenManager, refresh: TokenManager) -> JwtServiceBuilder {
        JwtServiceBuilder {
            access,
            refresh,
            cache: None,
            sign_out_timeout: None,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access.ttl()
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl()
    }

    /// TTL applied to session records
    pub fn sign_out_timeout(&self) -> Duration {
        self.sign_out_timeout
    }

    /// Mint a new pair for `user_id` and make it the only live one
    ///
    /// The pair is returned only after the session record is stored.
    pub async fn create_tokens(&self, user_id: &str) -> Result<TokenPair, JwtServiceError> {
        let access = self.access.create_token(user_id)?;
        let refresh = self.refresh.create_token(user_id)?;

        let record = TokenUids {
            access_token_uid: access.uid,
            refresh_token_uid: refresh.uid,
        };
        let value = serde_json::to_vec(&record)?;

        self.cache
            .set(&session_key(user_id), value, self.sign_out_timeout)
            .await?;

        tracing::debug!(user_id, "Issued token pair");

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    pub fn parse_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.access.parse_token(token)
    }

    pub fn parse_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.refresh.parse_token(token)
    }

    pub fn parse_token(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        match kind {
            TokenKind::Access => self.parse_access_token(token),
            TokenKind::Refresh => self.parse_refresh_token(token),
        }
    }

    pub async fn validate_access_token(&self, claims: &Claims) -> Result<(), JwtServiceError> {
        self.validate_token(TokenKind::Access, claims).await
    }

    pub async fn validate_refresh_token(&self, claims: &Claims) -> Result<(), JwtServiceError> {
        self.validate_token(TokenKind::Refresh, claims).await
    }

    /// Check that `claims` belong to the pair currently recorded for their subject
    pub async fn validate_token(
        &self,
        kind: TokenKind,
        claims: &Claims,
    ) -> Result<(), JwtServiceError> {
        let record = self.session(&claims.sub).await?;

        if record.uid(kind) != claims.uid {
            return Err(JwtServiceError::StaleToken);
        }
        Ok(())
    }

    /// Slide the session's idle deadline forward
    ///
    /// A no-op when no idle timeout is configured. Failures are logged and
    /// swallowed; a missing session is not a failure.
    pub async fn prolong_tokens(&self, user_id: &str) {
        if self.sign_out_timeout == self.refresh.ttl() {
            return;
        }

        match self
            .cache
            .expire(&session_key(user_id), self.sign_out_timeout)
            .await
        {
            Ok(()) => tracing::trace!(user_id, "Prolonged session"),
            Err(CacheError::NotFound) => {
                tracing::debug!(user_id, "No session to prolong");
            }
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to prolong session"),
        }
    }

    /// Drop the session record so every outstanding token for `user_id` dies
    pub async fn revoke_tokens(&self, user_id: &str) -> Result<(), JwtServiceError> {
        match self.cache.delete(&session_key(user_id)).await {
            Ok(()) | Err(CacheError::NotFound) => Ok(()),
            Err(e) => Err(JwtServiceError::Cache(e)),
        }
    }

    async fn session(&self, user_id: &str) -> Result<TokenUids, JwtServiceError> {
        let bytes = self.cache.get(&session_key(user_id)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
