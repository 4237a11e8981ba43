//! Signed token service
//!
//! Mints and parses RS256-signed JWTs carrying a subject and a random
//! per-issuance `uid`. The service is stateless: it knows nothing about
//! sessions, only about signatures and time bounds. Two instances run per
//! deployment, one for access tokens and one for refresh tokens, each with
//! its own key pair and TTL.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shortlink_core::config::MAX_TTL_SECS;
use shortlink_core::TokenConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Claims embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,
    /// Unique identifier of this particular issuance
    pub uid: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Not before (Unix seconds)
    pub nbf: u64,
    /// Expiration (Unix seconds)
    pub exp: u64,
}

/// A freshly minted token together with the uid embedded in it
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub uid: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Token TTL must be between one second and ten years")]
    InvalidTtl,

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token is not valid yet")]
    NotYetValid,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Unexpected token algorithm")]
    InvalidAlgorithm,

    #[error("Token uid is empty")]
    EmptyUid,

    #[error("Invalid token format")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::InvalidAlgorithm
            }
            _ => TokenError::Malformed,
        }
    }
}

/// Stateless signer/verifier for one kind of token
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager from PEM-encoded RSA keys
    ///
    /// # Arguments
    ///
    /// * `private_pem` - RSA private key used for signing (PKCS#1 or PKCS#8)
    /// * `public_pem` - Matching RSA public key used for verification
    /// * `ttl` - Lifetime of every token this manager mints
    ///
    /// # Returns
    ///
    /// * `Err(TokenError::InvalidKey)` - If a key does not parse or the two keys do not match
    /// * `Err(TokenError::InvalidTtl)` - If `ttl` is shorter than one second or above `MAX_TTL_SECS`
    pub fn new(private_pem: &[u8], public_pem: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        if ttl.as_secs() == 0 || ttl.as_secs() > MAX_TTL_SECS {
            return Err(TokenError::InvalidTtl);
        }

        let encoding_key = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| TokenError::InvalidKey(format!("private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| TokenError::InvalidKey(format!("public key: {e}")))?;

        // Only the RSA PKCS#1 v1.5 family is accepted; anything else in the
        // header (HS256, none, ...) is rejected before signature checks.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = vec![Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        let manager = Self {
            encoding_key,
            decoding_key,
            validation,
            ttl,
        };
        manager.check_key_pair()?;

        Ok(manager)
    }

    /// Create a manager from the key files named in `config`
    pub fn from_config(config: &TokenConfig) -> Result<Self, TokenError> {
        let private_pem = read_key(&config.private_key_path)?;
        let public_pem = read_key(&config.public_key_path)?;
        Self::new(&private_pem, &public_pem, config.ttl())
    }

    /// Lifetime of tokens minted by this manager
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `subject` with a fresh random uid
    pub fn create_token(&self, subject: &str) -> Result<SignedToken, TokenError> {
        let now = jsonwebtoken::get_current_timestamp();
        let exp = now
            .checked_add(self.ttl.as_secs())
            .ok_or(TokenError::InvalidTtl)?;
        let uid = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: subject.to_string(),
            uid: uid.clone(),
            iat: now,
            nbf: now,
            exp,
        };

        let token = self.sign(&claims)?;
        Ok(SignedToken { token, uid })
    }

    /// Verify the signature and time bounds of `token` and return its claims
    pub fn parse_token(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        if data.claims.uid.is_empty() {
            return Err(TokenError::EmptyUid);
        }

        Ok(data.claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn check_key_pair(&self) -> Result<(), TokenError> {
        let probe = self.create_token("key-pair-probe")?;
        self.parse_token(&probe.token)
            .map(|_| ())
            .map_err(|_| TokenError::InvalidKey("public key does not match private key".to_string()))
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, TokenError> {
    std::fs::read(path).map_err(|source| TokenError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}
