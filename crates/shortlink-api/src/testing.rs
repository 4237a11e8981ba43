//! Test helpers
//!
//! RSA key pairs are generated once per test binary; generating them per
//! test would dominate the run time.

use crate::auth::{
    Argon2Hasher, AuthService, JwtService, PasswordConfig, PasswordHasher, TokenManager,
};
use crate::state::AppState;
use crate::validation::ValidationContext;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use shortlink_core::{AppConfig, MemorySessionCache, MemoryUserRepository, SessionCache, UserRepository};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// PEM-encoded RSA key pair (PKCS#1)
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_pem: String,
    pub public_pem: String,
}

impl KeyPair {
    /// Generate a fresh 2048-bit key pair
    pub fn generate() -> Self {
        let mut rng = rsa::rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("generate RSA key");
        let public = RsaPublicKey::from(&private);

        Self {
            private_pem: private
                .to_pkcs1_pem(LineEnding::LF)
                .expect("encode private key")
                .to_string(),
            public_pem: public
                .to_pkcs1_pem(LineEnding::LF)
                .expect("encode public key"),
        }
    }
}

/// One key pair per token kind
#[derive(Debug)]
pub struct TestKeys {
    pub access: KeyPair,
    pub refresh: KeyPair,
}

/// Key pairs shared by every test in the binary
pub fn test_keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| TestKeys {
        access: KeyPair::generate(),
        refresh: KeyPair::generate(),
    })
}

pub fn access_manager(ttl: Duration) -> TokenManager {
    let keys = &test_keys().access;
    TokenManager::new(keys.private_pem.as_bytes(), keys.public_pem.as_bytes(), ttl)
        .expect("access token manager")
}

pub fn refresh_manager(ttl: Duration) -> TokenManager {
    let keys = &test_keys().refresh;
    TokenManager::new(keys.private_pem.as_bytes(), keys.public_pem.as_bytes(), ttl)
        .expect("refresh token manager")
}

/// Argon2 with minimal cost so hashing does not slow tests down
pub fn fast_hasher() -> Arc<dyn PasswordHasher> {
    Arc::new(
        Argon2Hasher::new(PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        })
        .expect("argon2 params"),
    )
}

/// Handles on the in-memory backends behind a test state
pub struct TestContext {
    pub state: Arc<AppState>,
    pub users: Arc<MemoryUserRepository>,
    pub cache: Arc<MemorySessionCache>,
}

/// Application state on in-memory backends with a 15 min / 7 day token pair
pub fn test_context() -> TestContext {
    test_context_with(AppConfig::default())
}

/// Same as [`test_context`] but with caller-supplied TTL/session settings
pub fn test_context_with(config: AppConfig) -> TestContext {
    let users = Arc::new(MemoryUserRepository::new());
    let cache = Arc::new(MemorySessionCache::new());

    let jwt = JwtService::builder(
        access_manager(config.tokens.access.ttl()),
        refresh_manager(config.tokens.refresh.ttl()),
    )
    .cache(cache.clone() as Arc<dyn SessionCache>)
    .sign_out_timeout(config.session.sign_out_timeout())
    .build()
    .expect("jwt service");
    let jwt = Arc::new(jwt);

    let auth = AuthService::new(
        users.clone() as Arc<dyn UserRepository>,
        fast_hasher(),
        jwt.clone(),
    );

    let state = Arc::new(AppState::new(
        config,
        users.clone(),
        jwt,
        Arc::new(auth),
        ValidationContext::new(),
    ));

    TestContext {
        state,
        users,
        cache,
    }
}
