//! User persistence
//!
//! The authentication core only talks to `UserRepository`; which backend
//! sits behind it is decided once at startup by `build_user_repository`.

mod file;
mod memory;
mod postgres;

pub use file::FileUserRepository;
pub use memory::MemoryUserRepository;
pub use postgres::PostgresUserRepository;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No user matches the lookup. Callers branch on this variant, so
    /// backends must never report a miss any other way.
    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage contract for user records
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user; `id`, `username` and `email` must be unused
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<User, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<User, RepositoryError>;

    /// Look a user up by either username or email
    async fn find_by_login(&self, login: &str) -> Result<User, RepositoryError>;

    /// Replace the stored password hash and bump `updated_at`
    async fn change_password(&self, id: &str, password_hash: &str) -> Result<(), RepositoryError>;

    /// Suspend (`Some`) or reinstate (`None`) an account
    async fn set_suspended(
        &self,
        id: &str,
        suspended_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;
}

/// Build the configured user repository backend
pub async fn build_user_repository(
    config: &DatabaseConfig,
) -> Result<Arc<dyn UserRepository>, RepositoryError> {
    let repository: Arc<dyn UserRepository> = match config.backend {
        DatabaseBackend::Memory => Arc::new(MemoryUserRepository::new()),
        DatabaseBackend::File => Arc::new(FileUserRepository::open(&config.file_path).await?),
        DatabaseBackend::Postgres => {
            let repository =
                PostgresUserRepository::connect(&config.postgres_url, config.postgres_pool_size)
                    .await?;
            repository.ensure_schema().await?;
            Arc::new(repository)
        }
    };

    tracing::info!(backend = ?config.backend, "User repository ready");
    Ok(repository)
}
