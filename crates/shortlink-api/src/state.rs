//! Application state management

use crate::auth::{AuthService, JwtService};
use crate::validation::ValidationContext;
use shortlink_core::{AppConfig, UserRepository};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    pub users: Arc<dyn UserRepository>,
    /// Token/session orchestrator
    pub jwt: Arc<JwtService>,
    pub auth: Arc<AuthService>,
    /// Request validation error translator
    pub validation: ValidationContext,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        jwt: Arc<JwtService>,
        auth: Arc<AuthService>,
        validation: ValidationContext,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            users,
            jwt,
            auth,
            validation,
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
