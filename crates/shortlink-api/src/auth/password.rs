//! Password hashing and verification
//!
//! Two interchangeable algorithms sit behind the [`PasswordHasher`] trait:
//! Argon2id and bcrypt. The algorithm used for new hashes comes from
//! configuration; verification picks the algorithm from the stored hash
//! itself so records written under a previous setting keep working.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Argon2, Params,
};
use shortlink_core::{HashAlgorithm, HasherConfig};
use std::sync::Arc;
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum HashError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// One-way salted credential hashing
pub trait PasswordHasher: Send + Sync {
    /// Hash `password` with a fresh random salt
    fn hash_password(&self, password: &str) -> Result<String, HashError>;

    /// Check `password` against a stored hash
    ///
    /// Returns `Ok(false)` on mismatch; errors are reserved for hashes that
    /// cannot be interpreted.
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, HashError>;
}

/// Build the hasher selected by configuration
pub fn build_hasher(config: &HasherConfig) -> Result<Arc<dyn PasswordHasher>, HashError> {
    let hasher: Arc<dyn PasswordHasher> = match config.algorithm {
        HashAlgorithm::Argon2 => Arc::new(Argon2Hasher::new(PasswordConfig {
            memory_cost: config.argon2_memory_cost,
            time_cost: config.argon2_time_cost,
            parallelism: config.argon2_parallelism,
            output_len: Some(32),
        })?),
        HashAlgorithm::Bcrypt => Arc::new(BcryptHasher::new(config.bcrypt_cost)?),
    };
    Ok(hasher)
}

/// Verify against whichever algorithm produced `hash`
fn verify_encoded(password: &str, hash: &str) -> Result<bool, HashError> {
    if hash.starts_with("$argon2") {
        let parsed = PasswordHash::new(hash).map_err(|_| HashError::InvalidHashFormat)?;

        // A PHC string without salt or digest parses but can never match;
        // it is a corrupt record, not a wrong password.
        if parsed.salt.is_none() || parsed.hash.is_none() {
            return Err(HashError::InvalidHashFormat);
        }

        // Parameters come from the PHC string, so the default instance
        // verifies hashes of any cost.
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::VerificationFailed(e.to_string())),
        }
    } else if hash.starts_with("$2") {
        bcrypt::verify(password, hash).map_err(|_| HashError::InvalidHashFormat)
    } else {
        Err(HashError::InvalidHashFormat)
    }
}

// ============================================================================
// Argon2id
// ============================================================================

/// Argon2 parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Iterations (default: 3)
    pub time_cost: u32,
    /// Lanes (default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params, HashError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| HashError::HashingFailed(e.to_string()))
    }
}

/// Argon2id hasher producing PHC strings
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Fails if the parameters are outside what Argon2 accepts
    pub fn new(config: PasswordConfig) -> Result<Self, HashError> {
        Ok(Self {
            params: config.to_params()?,
        })
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash_password(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        );

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| HashError::HashingFailed(e.to_string()))?;

        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        verify_encoded(password, hash)
    }
}

// ============================================================================
// bcrypt
// ============================================================================

#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// `cost` must lie within bcrypt's 4..=31
    pub fn new(cost: u32) -> Result<Self, HashError> {
        if !(4..=31).contains(&cost) {
            return Err(HashError::HashingFailed(format!(
                "bcrypt cost {cost} is outside 4..=31"
            )));
        }
        Ok(Self { cost })
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash_password(&self, password: &str) -> Result<String, HashError> {
        bcrypt::hash(password, self.cost).map_err(|e| HashError::HashingFailed(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        verify_encoded(password, hash)
    }
}

/// Validate password strength
///
/// Checks if a password meets minimum security requirements:
/// - At least 8 characters
/// - At least 1 uppercase letter
/// - At least 1 lowercase letter
/// - At least 1 digit
/// - At least 1 special character
///
/// # Returns
///
/// * `Ok(())` - Password meets requirements
/// * `Err(&'static str)` - The first requirement the password misses
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long");
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err("Password must contain at least one special character");
    }

    Ok(())
}
