//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Sets X-Request-Id (UUIDv4) unless the client sent one
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 if exceeded, for every request
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  CORS + Body Cap │
//! └────────┬─────────┘
//!          │
//!          ▼
//!   Router → Handler  (protected handlers check X-API-Key first → 401)
//! ```
//!
//! # Routes
//!
//! - `GET /health` - Liveness (no auth)
//! - `POST /api/v1/items`, `GET /api/v1/items` - Create, list
//! - `GET|PATCH|DELETE /api/v1/items/{id}` - Read, replace, delete

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{RateLimitGate, RateLimitLayer, TrustedProxyConfig};
use crate::state::AppState;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Build the application router with all routes and middleware configured.
///
/// The router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` for per-client rate
/// limiting; otherwise all clients share the `"unknown"` window.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/v1/items",
            post(handlers::create_item).get(handlers::list_items),
        )
        .route(
            "/api/v1/items/{id}",
            get(handlers::get_item)
                .patch(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .with_state(state.clone());

    // =========================================================================
    // Apply Middleware Stack (order matters - the last layer runs first)
    // =========================================================================

    // 1. Request body size limit
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));

    // 2. CORS
    router = router.layer(build_cors_layer(&config.cors_allowed_origins));

    // 3. Rate limiting - wraps every route, including /health and unmatched paths
    match &state.rate_limiter {
        Some(limiter) => {
            info!(
                max_requests = limiter.capacity(),
                window_secs = limiter.window().as_secs(),
                trusted_proxies = config.trusted_proxies.len(),
                "Rate limiting enabled"
            );
            let gate = RateLimitGate::new(
                limiter.clone(),
                TrustedProxyConfig::new(&config.trusted_proxies),
            );
            router = router.layer(RateLimitLayer::new(gate));
        }
        None => info!("Rate limiting disabled (RATE_LIMIT_MAX_REQUESTS=0)"),
    }

    // 4. Tracing, with the request id set before and echoed after
    router
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
}

/// Build CORS layer from configuration.
///
/// # Security Note
///
/// Using `*` (any origin) is convenient for development but should be
/// avoided in production. Specify explicit origins instead.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{Method, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::middleware::API_KEY_HEADER;

    const KEY: &str = "test-key";

    fn app(max_requests: usize) -> Router {
        app_with(Config {
            api_key: KEY.to_string(),
            rate_limit_max_requests: max_requests,
            ..Config::default()
        })
    }

    fn app_with(config: Config) -> Router {
        build_router(AppState::new(config).unwrap())
    }

    fn request(method: Method, uri: &str, peer: &str, key: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let mut req = builder.body(body).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_build_cors_layer_any() {
        let _layer = build_cors_layer(&["*".to_string()]);
    }

    #[test]
    fn test_build_cors_layer_specific() {
        let _layer = build_cors_layer(&[
            "https://example.com".to_string(),
            "https://app.example.com".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_rate_limited_client_never_reaches_auth() {
        let app = app(2);
        let peer = "10.0.0.1:5000";

        for _ in 0..2 {
            let res = send(&app, request(Method::GET, "/health", peer, None, None)).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        // Valid key, but the window is full
        let res = send(&app, request(Method::GET, "/api/v1/items", peer, Some(KEY), None)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()["x-ratelimit-limit"], "2");

        let body = json_body(res).await;
        assert_eq!(body["error"], "rate_limited");
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_count_toward_limit() {
        let app = app(1);
        let peer = "10.0.0.2:5000";

        let res = send(&app, request(Method::GET, "/api/v1/items", peer, None, None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, request(Method::GET, "/api/v1/items", peer, Some(KEY), None)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unmatched_routes_are_rate_limited() {
        let app = app(1);
        let peer = "10.0.0.3:5000";

        let res = send(&app, request(Method::GET, "/nope", peer, None, None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = send(&app, request(Method::GET, "/nope", peer, None, None)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_peers_have_separate_windows() {
        let app = app(1);

        let res = send(&app, request(Method::GET, "/health", "10.0.0.4:1", None, None)).await;
        assert_eq!(res.status(), StatusCode::OK);

        // Same host, different port: same identity
        let res = send(&app, request(Method::GET, "/health", "10.0.0.4:2", None, None)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = send(&app, request(Method::GET, "/health", "10.0.0.5:1", None, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_does_not_partition_windows() {
        let app = app(1);
        let peer = "10.0.0.6:1";

        let res = send(&app, request(Method::GET, "/api/v1/items", peer, Some(KEY), None)).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(&app, request(Method::GET, "/api/v1/items", peer, Some("other"), None)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_trusted_proxy_forwarded_identity() {
        let app = app_with(Config {
            api_key: KEY.to_string(),
            rate_limit_max_requests: 1,
            trusted_proxies: vec!["10.0.0.0/8".to_string()],
            ..Config::default()
        });

        let mut first = request(Method::GET, "/health", "10.9.9.9:1", None, None);
        first.headers_mut().insert("x-forwarded-for", "203.0.113.1".parse().unwrap());
        assert_eq!(send(&app, first).await.status(), StatusCode::OK);

        // Different client behind the same proxy gets its own window
        let mut second = request(Method::GET, "/health", "10.9.9.9:1", None, None);
        second.headers_mut().insert("x-forwarded-for", "203.0.113.2".parse().unwrap());
        assert_eq!(send(&app, second).await.status(), StatusCode::OK);

        let mut repeat = request(Method::GET, "/health", "10.9.9.9:1", None, None);
        repeat.headers_mut().insert("x-forwarded-for", "203.0.113.1".parse().unwrap());
        assert_eq!(send(&app, repeat).await.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_rate_limiting_disabled() {
        let app = app(0);
        for _ in 0..5 {
            let res = send(&app, request(Method::GET, "/health", "10.0.0.7:1", None, None)).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_auth_checked_before_existence() {
        let app = app(100);
        let peer = "10.0.1.1:1";

        for method in [Method::GET, Method::DELETE] {
            let res = send(&app, request(method, "/api/v1/items/999", peer, None, None)).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }

        let res = send(
            &app,
            request(
                Method::PATCH,
                "/api/v1/items/999",
                peer,
                Some("wrong"),
                Some(json!({"name": "x"})),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, request(Method::GET, "/api/v1/items/999", peer, Some(KEY), None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_auth_checked_before_body_parsing() {
        let app = app(100);
        let mut req = request(Method::POST, "/api/v1/items", "10.0.1.2:1", None, None);
        req.headers_mut().insert("content-type", "application/json".parse().unwrap());
        *req.body_mut() = Body::from("{not json");

        assert_eq!(send(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_body_and_request_id() {
        let app = app(100);
        let res = send(&app, request(Method::GET, "/health", "10.0.1.3:1", None, None)).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(json_body(res).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_client_request_id_is_echoed() {
        let app = app(100);
        let mut req = request(Method::GET, "/health", "10.0.1.4:1", None, None);
        req.headers_mut().insert(REQUEST_ID_HEADER, "abc-123".parse().unwrap());

        let res = send(&app, req).await;
        assert_eq!(res.headers()[REQUEST_ID_HEADER], "abc-123");
    }

    #[tokio::test]
    async fn test_rejected_requests_carry_request_id() {
        let app = app(1);
        let peer = "10.0.1.5:1";
        send(&app, request(Method::GET, "/health", peer, None, None)).await;

        let res = send(&app, request(Method::GET, "/health", peer, None, None)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_any_deserializable_payload_is_stored() {
        let app = app(100);
        let peer = "10.0.2.1:1";

        for name in [String::new(), "x".repeat(300)] {
            let res = send(
                &app,
                request(Method::POST, "/api/v1/items", peer, Some(KEY), Some(json!({ "name": name }))),
            )
            .await;
            assert_eq!(res.status(), StatusCode::CREATED);
            assert_eq!(json_body(res).await["name"], name);
        }
    }

    #[tokio::test]
    async fn test_negative_id_is_not_found() {
        let app = app(100);
        let peer = "10.0.2.2:1";

        let res = send(&app, request(Method::GET, "/api/v1/items/-1", peer, Some(KEY), None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"], "not_found");

        let res = send(
            &app,
            request(Method::PATCH, "/api/v1/items/-1", peer, Some(KEY), Some(json!({ "name": "x" }))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
