//! Router-wide middleware
//!
//! Request authentication lives in `auth::middleware`; this module holds the
//! layers applied to every route.

pub mod security_headers;

pub use security_headers::security_headers_middleware;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS layer for the configured origins
///
/// An origin list containing `*` allows any origin. Origins that are not
/// valid header values are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn preflight(origins: &[String], origin: &str) -> Option<HeaderValue> {
        let app = Router::new()
            .route("/x", get(|| async { "ok" }))
            .layer(cors_layer(origins));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/x")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned()
    }

    #[tokio::test]
    async fn test_listed_origin_is_allowed() {
        let origins = vec!["http://localhost:3000".to_string()];

        assert_eq!(
            preflight(&origins, "http://localhost:3000").await.unwrap(),
            "http://localhost:3000"
        );
        assert!(preflight(&origins, "http://evil.example").await.is_none());
    }

    #[tokio::test]
    async fn test_wildcard_allows_any_origin() {
        let origins = vec!["*".to_string()];
        assert_eq!(
            preflight(&origins, "http://anything.example").await.unwrap(),
            "*"
        );
    }
}
