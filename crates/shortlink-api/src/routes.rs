//! API route definitions

use crate::auth::{identity_middleware, prolong_session_middleware};
use crate::handlers::{auth, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/sign-up", post(auth::sign_up_handler))
        .route("/auth/sign-in", post(auth::sign_in_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    // Authenticated, but not counted as session activity
    let session_routes = Router::new()
        .route("/auth/sign-out", post(auth::sign_out_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    // Authenticated and prolonging the session; identity runs first
    let user_routes = Router::new()
        .route("/users/me", get(users::me_handler))
        .route("/users/me/password", put(users::change_password_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            prolong_session_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state, identity_middleware));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(user_routes)
}
