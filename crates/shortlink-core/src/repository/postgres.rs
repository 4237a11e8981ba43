//! PostgreSQL user repository
//!
//! Stores users in a single `users` table using SQLx.

use super::{RepositoryError, UserRepository};
use crate::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

/// PostgreSQL user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new connection pool
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Database(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `users` table if it is missing
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                username      TEXT NOT NULL,
                email         TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at    TIMESTAMPTZ NOT NULL,
                updated_at    TIMESTAMPTZ NOT NULL,
                suspended_at  TIMESTAMPTZ,
                CONSTRAINT users_username_key UNIQUE (username),
                CONSTRAINT users_email_key UNIQUE (email)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create users table: {e}")))?;

        Ok(())
    }

    async fn fetch_one_where(&self, column: &str, value: &str) -> Result<User, RepositoryError> {
        let query = format!(
            "SELECT id, username, email, password_hash, created_at, updated_at, suspended_at \
             FROM users WHERE {column} = $1 LIMIT 1"
        );

        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to fetch user: {e}")))?;

        row.map(User::from).ok_or(RepositoryError::UserNotFound)
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    suspended_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
            suspended_at: row.suspended_at,
        }
    }
}

fn map_insert_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            match db.constraint() {
                Some("users_username_key") => return RepositoryError::UsernameTaken,
                Some("users_email_key") => return RepositoryError::EmailTaken,
                _ => {}
            }
        }
    }
    RepositoryError::Database(format!("Failed to create user: {e}"))
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, created_at, updated_at, suspended_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.suspended_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<User, RepositoryError> {
        self.fetch_one_where("id", id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        self.fetch_one_where("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        self.fetch_one_where("email", email).await
    }

    async fn find_by_login(&self, login: &str) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at, suspended_at
            FROM users
            WHERE username = $1 OR email = $1
            LIMIT 1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to fetch user: {e}")))?;

        row.map(User::from).ok_or(RepositoryError::UserNotFound)
    }

    async fn change_password(&self, id: &str, password_hash: &str) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| RepositoryError::Database(format!("Failed to change password: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound);
        }
        Ok(())
    }

    async fn set_suspended(
        &self,
        id: &str,
        suspended_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET suspended_at = $1, updated_at = NOW() WHERE id = $2")
                .bind(suspended_at)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| RepositoryError::Database(format!("Failed to update user: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound);
        }
        Ok(())
    }
}
