//! Authentication and session management
//!
//! - `token`: RS256 token minting and parsing
//! - `session`: pairs of tokens tied to a cached session record
//! - `password`: Argon2id / bcrypt hashing
//! - `service`: sign-up, sign-in, refresh, sign-out, password change
//! - `middleware`: request authentication and session prolonging

pub mod middleware;
pub mod password;
pub mod service;
pub mod session;
pub mod token;

pub use middleware::{identity_middleware, prolong_session_middleware};
pub use password::{
    build_hasher, validate_password_strength, Argon2Hasher, BcryptHasher, HashError,
    PasswordConfig, PasswordHasher,
};
pub use service::{
    AuthError, AuthService, ChangePasswordRequest, RefreshRequest, SignInRequest, SignUpRequest,
    UserInfo,
};
pub use session::{JwtService, JwtServiceBuilder, JwtServiceError, TokenKind, TokenPair, TokenUids};
pub use token::{Claims, SignedToken, TokenError, TokenManager};
