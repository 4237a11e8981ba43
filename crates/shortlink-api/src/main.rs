//! shortlink API server
//!
//! Configuration comes from the TOML file named by `SHORTLINK_CONFIG` (with
//! environment overrides) or from the environment alone.

use anyhow::Context;
use shortlink_api::auth::{build_hasher, AuthService, JwtService, TokenManager};
use shortlink_api::{create_router, state::AppState, validation::ValidationContext};
use shortlink_core::config::{AppConfig, LoggingConfig};
use shortlink_core::{build_session_cache, build_user_repository};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    let users = build_user_repository(&config.database)
        .await
        .context("Failed to open user repository")?;
    let cache = build_session_cache(&config.cache)
        .await
        .context("Failed to connect session cache")?;
    let hasher = build_hasher(&config.hasher).context("Invalid password hasher settings")?;

    let access = TokenManager::from_config(&config.tokens.access)
        .context("Failed to load access token keys")?;
    let refresh = TokenManager::from_config(&config.tokens.refresh)
        .context("Failed to load refresh token keys")?;
    let jwt = JwtService::builder(access, refresh)
        .cache(cache)
        .sign_out_timeout(config.session.sign_out_timeout())
        .build()
        .context("Invalid session settings")?;
    let jwt = Arc::new(jwt);

    let auth = Arc::new(AuthService::new(users.clone(), hasher, jwt.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        users,
        jwt,
        auth,
        ValidationContext::new(),
    ));

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("shortlink API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("SHORTLINK_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
