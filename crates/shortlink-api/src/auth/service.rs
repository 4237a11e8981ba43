//! Authentication service layer
//!
//! Registration, login, token refresh, logout and password change on top of
//! the user repository, the password hasher and the session orchestrator.

use super::password::{HashError, PasswordHasher};
use super::session::{JwtService, JwtServiceError, TokenKind, TokenPair};
use super::token::Claims;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shortlink_core::{RepositoryError, User, UserRepository};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use validator::{Validate, ValidationError};

// ============================================================================
// Request / response schemas
// ============================================================================

/// User registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default)]
    #[validate(length(min = 3, max = 32), custom(function = "validate_username"))]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 1), email)]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 8, max = 64), custom(function = "validate_strength"))]
    pub password: String,
}

/// Login with username or email
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub login: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub current_password: String,

    #[serde(default)]
    #[validate(length(min = 8, max = 64), custom(function = "validate_strength"))]
    pub new_password: String,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        return Ok(());
    }

    let mut err = ValidationError::new("username_charset");
    err.message = Some("Username may only contain letters, digits, '.', '_' and '-'".into());
    Err(err)
}

fn validate_strength(password: &str) -> Result<(), ValidationError> {
    super::password::validate_password_strength(password).map_err(|reason| {
        let mut err = ValidationError::new("password_strength");
        err.message = Some(reason.into());
        err
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Outcomes the HTTP layer distinguishes
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{field} already exists")]
    AlreadyExists { field: &'static str },

    #[error("Incorrect login or password")]
    IncorrectCredentials,

    #[error("Invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: &'static str,
    },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Current user is suspended")]
    Suspended,

    #[error("User repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Session(#[from] JwtServiceError),

    #[error("Background task failed: {0}")]
    Task(String),
}

// ============================================================================
// Service
// ============================================================================

/// Password hashed once per service and checked on unknown logins
const DUMMY_PASSWORD: &str = "shortlink-dummy-password";

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    jwt: Arc<JwtService>,
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        jwt: Arc<JwtService>,
    ) -> Self {
        Self {
            users,
            hasher,
            jwt,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Register a new user
    ///
    /// Email uniqueness is checked before username uniqueness; the first
    /// collision is reported as `AlreadyExists` naming the field.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User, AuthError> {
        ensure_absent(self.users.find_by_email(&request.email).await, "email")?;
        ensure_absent(
            self.users.find_by_username(&request.username).await,
            "username",
        )?;

        let password_hash = self.hash(request.password).await?;
        let user = User::new(request.username, request.email, password_hash);

        // A concurrent registration can still win between the checks and
        // the insert; the repository's own uniqueness errors cover that.
        self.users.create(&user).await.map_err(|e| match e {
            RepositoryError::EmailTaken => AuthError::AlreadyExists { field: "email" },
            RepositoryError::UsernameTaken => AuthError::AlreadyExists { field: "username" },
            other => AuthError::Repository(other),
        })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verify credentials and issue a fresh token pair
    ///
    /// An unknown login and a wrong password produce the same error.
    pub async fn sign_in(&self, request: SignInRequest) -> Result<(User, TokenPair), AuthError> {
        let user = match self.users.find_by_login(&request.login).await {
            Ok(user) => user,
            Err(RepositoryError::UserNotFound) => {
                // Same hashing work as a wrong password, so timing does not
                // tell whether the login exists
                self.verify_dummy(request.password).await?;
                return Err(AuthError::IncorrectCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.verify(request.password, user.password_hash.clone()).await? {
            return Err(AuthError::IncorrectCredentials);
        }

        let tokens = self.jwt.create_tokens(&user.id).await?;
        Ok((user, tokens))
    }

    /// Invalidate both outstanding tokens of `user_id`
    pub async fn sign_out(&self, user_id: &str) -> Result<(), AuthError> {
        self.jwt.revoke_tokens(user_id).await?;
        Ok(())
    }

    /// Exchange a live refresh token for a new pair
    ///
    /// The previous pair dies with the overwrite of the session record.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, TokenPair), AuthError> {
        let claims = self
            .jwt
            .parse_refresh_token(refresh_token)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected refresh token");
                AuthError::InvalidField {
                    field: "refreshToken",
                    message: "Refresh token is invalid or expired",
                }
            })?;

        let user = self.authenticate(TokenKind::Refresh, &claims).await?;
        let tokens = self.jwt.create_tokens(&user.id).await?;
        Ok((user, tokens))
    }

    /// Replace the password of `user_id` and end its session
    pub async fn change_password(
        &self,
        user_id: &str,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let user = self.users.find_by_id(user_id).await?;

        if !self
            .verify(request.current_password, user.password_hash)
            .await?
        {
            return Err(AuthError::InvalidField {
                field: "currentPassword",
                message: "Current password is incorrect",
            });
        }

        let password_hash = self.hash(request.new_password).await?;
        self.users.change_password(user_id, &password_hash).await?;
        self.jwt.revoke_tokens(user_id).await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Resolve the user behind already parsed `claims`
    ///
    /// Session validation and the user lookup run concurrently and both are
    /// awaited. A suspended user yields `Suspended` whatever the session
    /// check said; every other failure yields `Unauthorized`.
    pub async fn authenticate(&self, kind: TokenKind, claims: &Claims) -> Result<User, AuthError> {
        let (session, user) = tokio::join!(
            self.jwt.validate_token(kind, claims),
            self.users.find_by_id(&claims.sub),
        );

        if let Ok(user) = &user {
            if user.is_suspended() {
                return Err(AuthError::Suspended);
            }
        }

        if let Err(e) = session {
            if e.is_revoked() {
                tracing::debug!(user_id = %claims.sub, error = %e, "Token is not live");
            } else {
                tracing::error!(user_id = %claims.sub, error = %e, "Session lookup failed");
            }
            return Err(AuthError::Unauthorized);
        }

        user.map_err(|e| {
            if !matches!(e, RepositoryError::UserNotFound) {
                tracing::error!(user_id = %claims.sub, error = %e, "User lookup failed");
            }
            AuthError::Unauthorized
        })
    }

    async fn hash(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))?
            .map_err(AuthError::from)
    }

    async fn verify_dummy(&self, password: String) -> Result<(), AuthError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD.to_string()))
            .await?;
        self.verify(password, hash.clone()).await?;
        Ok(())
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))?
            .map_err(AuthError::from)
    }
}

/// Map a uniqueness lookup to success only when nothing was found
fn ensure_absent(
    lookup: Result<User, RepositoryError>,
    field: &'static str,
) -> Result<(), AuthError> {
    match lookup {
        Err(RepositoryError::UserNotFound) => Ok(()),
        Ok(_) => Err(AuthError::AlreadyExists { field }),
        Err(e) => Err(e.into()),
    }
}
