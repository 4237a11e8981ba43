//! shortlink core - domain model, storage contracts and backends
//!
//! This crate defines the pieces the authentication core depends on but
//! does not own:
//! - The `User` identity record
//! - The `UserRepository` contract and its memory/file/PostgreSQL backends
//! - The `SessionCache` contract and its memory/Redis backends
//! - Configuration management

pub mod cache;
pub mod config;
pub mod repository;

pub use cache::{build_session_cache, CacheError, MemorySessionCache, RedisSessionCache, SessionCache};
pub use config::{
    AppConfig, CacheBackend, CacheConfig, ConfigError, DatabaseBackend, DatabaseConfig,
    HashAlgorithm, HasherConfig, LoggingConfig, ServerConfig, SessionConfig, TokenConfig,
    TokensConfig,
};
pub use repository::{
    build_user_repository, FileUserRepository, MemoryUserRepository, PostgresUserRepository,
    RepositoryError, UserRepository,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// User identity record
///
/// `id`, `username` and `email` are unique across the repository. The
/// `id` never changes once assigned. A present `suspended_at` marks the
/// account as administratively disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new active user with a fresh identifier
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
            suspended_at: None,
        }
    }

    /// Whether the account is suspended
    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }
}
