//! HTTP API gateway for CodeCouncil.
//!
//! Exposes the agent session operations over REST: start a run, poll a
//! session, list the registered tools, plus a health check.
//!
//! Built on Axum; sessions live in the process-wide [`SessionStore`].

pub mod agents;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use codecouncil_agent::{AgentRunner, SessionStore};

/// Header carrying a caller-supplied model API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: codecouncil_config::AppConfig,
    pub store: Arc<SessionStore>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router.
///
/// Layers applied:
/// - CORS for the configured frontend origin
/// - Request body size limit
/// - In-memory rate limiting per client (`/health` exempt)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let gateway = &state.config.gateway;

    let allow_origin = match gateway.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            warn!(origin = %gateway.allowed_origin, error = %e, "Invalid CORS origin; cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    let rate_limiter = Arc::new(RateLimiter::new(
        gateway.rate_limit_per_minute,
        Duration::from_secs(60),
    ));
    let body_limit = gateway.max_body_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/agents/start", post(agents::start_agent_handler))
        .route("/api/agents/tools", get(agents::list_tools_handler))
        .route("/api/agents/{id}", get(agents::get_session_handler))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build the gateway state from configuration: provider, tools, runner
/// and session store.
pub fn build_state(
    config: codecouncil_config::AppConfig,
) -> Result<SharedState, Box<dyn std::error::Error>> {
    let providers = codecouncil_providers::router::build_from_config(&config);
    let provider = providers
        .default()
        .ok_or_else(|| format!("Provider '{}' is not available", config.default_provider))?;

    if !provider.has_fallback_credential() {
        warn!(
            provider = provider.name(),
            "No deployment API key configured; every request must supply one"
        );
    }

    let tools = Arc::new(codecouncil_tools::registry_with_search(
        config.tools.search_endpoint.clone(),
    ));
    let runner = AgentRunner::from_config(&config, provider, tools);
    let store = Arc::new(SessionStore::from_config(&config, runner));

    Ok(Arc::new(GatewayState { config, store }))
}

/// Start the gateway HTTP server.
pub async fn start(config: codecouncil_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(config)?;
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Rate limiting middleware. Clients are keyed by their API key header,
/// then by `X-Forwarded-For`, else share the "anonymous" bucket. Returns
/// 429 Too Many Requests when exceeded.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let headers = req.headers();
    let client_key = headers
        .get(API_KEY_HEADER)
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();

    if !limiter.check(&client_key) {
        warn!(path = %req.uri().path(), "Rate limit exceeded");
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
    }

    next.run(req).await
}

// --- Shared responses ---

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
    })
}

async fn not_found_handler() -> (StatusCode, Json<ErrorResponse>) {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(config: codecouncil_config::AppConfig) -> SharedState {
        build_state(config).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(Default::default()));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let app = build_router(test_state(Default::default()));

        let req = Request::builder()
            .uri("/api/nope")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Not found");
    }

    #[tokio::test]
    async fn rate_limit_rejects_excess_but_not_health() {
        let mut config = codecouncil_config::AppConfig::default();
        config.gateway.rate_limit_per_minute = 2;
        let app = build_router(test_state(config));

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let req = Request::builder()
                .uri("/api/agents/tools")
                .body(Body::empty())
                .unwrap();
            statuses.push(app.clone().oneshot(req).await.unwrap().status());
        }
        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);
    }

    #[test]
    fn rate_limiter_windows_per_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }
}
