//! vigil-api - HTTP and WebSocket API server for vigil

mod handlers;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Query, State,
    },
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use vigil_core::{defaults, AuthSession, ClientFrame, ServerFrame, TokenVerifier};
use vigil_db::{log_pool_metrics, Database, PgTokenRepository, PoolConfig};
use vigil_realtime::{
    AlertPublisher, BridgeConfig, ConnectionRegistry, Session, SubscriptionBridge,
};

use handlers::alerts::{
    acknowledge_alert, create_alert, escalate_alert, get_alert, list_alerts, resolve_alert,
    update_patient_status,
};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically, which keeps
/// log correlation cheap when tracing an alert across nodes.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Token verifier backing the auth extractors.
    tokens: Arc<dyn TokenVerifier>,
    /// Live WebSocket sessions on this node, fed by the subscription bridge.
    registry: ConnectionRegistry,
    /// Bus publisher run after each durable alert write.
    publisher: AlertPublisher,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
    /// Active WebSocket connection count.
    ws_connections: Arc<AtomicUsize>,
}

// =============================================================================
// CORS CONFIGURATION HELPER
// =============================================================================

/// Parse allowed origins from comma-separated environment variable.
///
/// Enforces strict origin whitelisting for CORS; the alert surface is never
/// exposed to arbitrary websites.
///
/// # Environment Variable
/// `ALLOWED_ORIGINS` - Comma-separated list of allowed origins
///
/// # Default Origins
/// If not set or empty:
/// - http://localhost:3000
/// - http://localhost:5173
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    if origins_str.trim().is_empty() {
        // Default origins
        return vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "vigil_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vigil_api=debug,tower_http=debug".into());

    let subscriber = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("vigil-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            subscriber.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            subscriber
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            subscriber.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/vigil".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| defaults::SERVER_PORT.to_string())
        .parse()
        .unwrap_or(defaults::SERVER_PORT);

    // Rate limiting configuration
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60 = 1 minute)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .unwrap_or_else(|_| defaults::RATE_LIMIT_REQUESTS.to_string())
        .parse()
        .unwrap_or(defaults::RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .unwrap_or_else(|_| defaults::RATE_LIMIT_PERIOD_SECS.to_string())
        .parse()
        .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Session registry plus this node's bus subscription bridge
    let registry = ConnectionRegistry::new();
    let bridge = SubscriptionBridge::new(registry.clone(), BridgeConfig::from_env());
    let bridge_handle = bridge.start();

    // Publisher used by REST handlers after each committed write
    let publisher = AlertPublisher::from_env().await;

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    // Create app state
    let tokens: Arc<dyn TokenVerifier> = Arc::new(PgTokenRepository::new(db.pool().clone()));
    let state = AppState {
        db,
        tokens,
        registry,
        publisher,
        rate_limiter,
        ws_connections: Arc::new(AtomicUsize::new(0)),
    };

    // Periodic pool health logging
    let metrics_pool = state.db.pool().clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tick.tick().await;
            log_pool_metrics(&metrics_pool);
        }
    });

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Alert lifecycle
        .route("/api/v1/alerts", post(create_alert).get(list_alerts))
        .route("/api/v1/alerts/:id", get(get_alert))
        .route("/api/v1/alerts/:id/acknowledge", patch(acknowledge_alert))
        .route("/api/v1/alerts/:id/resolve", patch(resolve_alert))
        .route("/api/v1/alerts/:id/escalate", patch(escalate_alert))
        // Patient condition broadcast
        .route("/api/v1/patients/:id/status", post(update_patient_status))
        // WebSocket alert stream
        .route("/ws", get(ws_handler))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(defaults::CORS_MAX_AGE_SECS))
        })
        .layer(CatchPanicLayer::new())
        // Alert payloads are small; anything larger is a client error
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the bus subscription before exiting
    bridge_handle.shutdown().await.ok();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

// =============================================================================
// WEBSOCKET ALERT STREAM
// =============================================================================

/// WebSocket handler for the real-time alert stream.
///
/// Operators connect to `/ws` (token in the `Authorization` header or a
/// `token` query parameter) and receive JSON-encoded frames for their
/// organization. The first frame on every session is a `pong` carrying the
/// server clock.
async fn ws_handler(
    ws: WebSocketUpgrade,
    auth: Authenticated,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_alert_stream(socket, state, auth.session))
}

async fn handle_alert_stream(socket: WebSocket, state: AppState, auth: AuthSession) {
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();

    // Patient tokens authenticate but are not operators. The HTTP upgrade
    // has already completed, so the refusal is a close frame rather than a
    // status code.
    if !auth.role.is_operator() {
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "Operator role required".into(),
            })))
            .await;
        return;
    }

    let count = state.ws_connections.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!(
        active = count,
        organization_id = %auth.organization_id,
        operator_id = %auth.operator_id,
        "WebSocket session opened"
    );

    let (session, mut frame_rx) = Session::new(auth.operator_id, auth.organization_id);
    let session_id = session.session_id;
    let organization_id = session.organization_id;
    // Inbound pings answer through the same outbound buffer, so replies
    // stay ordered with broadcast frames.
    let pong_tx = session.sender.clone();
    state.registry.register(session).await;

    // First frame on every session is a pong carrying the server clock.
    if let Ok(json) = serde_json::to_string(&ServerFrame::pong_now()) {
        let _ = sender.send(Message::Text(json)).await;
    }

    // Forward registry frames to the socket, interleaving keepalive pings
    let send_task = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(std::time::Duration::from_secs(
            defaults::WS_KEEPALIVE_INTERVAL_SECS,
        ));
        loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Ok(json) = serde_json::to_string(&frame) {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Handle incoming messages from the subscriber
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(ref text) => {
                    if let Ok(ClientFrame::Ping) = serde_json::from_str::<ClientFrame>(text) {
                        let _ = pong_tx.send(ServerFrame::pong_now()).await;
                    }
                    // Anything else is ignored; subscribers are read-mostly
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    state.registry.unregister(organization_id, session_id).await;
    let count = state.ws_connections.fetch_sub(1, Ordering::Relaxed) - 1;
    tracing::info!(
        active = count,
        session_id = %session_id,
        "WebSocket session closed"
    );
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    // If rate limiting is disabled, pass through
    if let Some(limiter) = &state.rate_limiter {
        // Check rate limit
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE
// =============================================================================

/// Query parameter fallback for browser WebSocket clients, which cannot set
/// an `Authorization` header.
#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Extractor resolving the bearer token to an authenticated session.
///
/// The token is read from the `Authorization: Bearer` header, falling back
/// to a `token` query parameter; the header wins when both are present.
/// Missing, unknown, and expired tokens are all rejected with 401.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub session: AuthSession,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_string());

        let token = match header_token {
            Some(token) => Some(token),
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|q| q.0.token),
        };

        let token =
            token.ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        let session = state
            .tokens
            .resolve(&token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(Authenticated { session })
    }
}

/// Extractor that additionally requires an operator role.
///
/// Patient tokens authenticate but may not act on the alert surface.
#[derive(Debug, Clone)]
pub struct RequireOperator {
    pub session: AuthSession,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireOperator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = Authenticated::from_request_parts(parts, state).await?;

        if !auth.session.role.is_operator() {
            return Err(ApiError::Forbidden("Operator role required".to_string()));
        }

        Ok(RequireOperator {
            session: auth.session,
        })
    }
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(vigil_core::Error),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<vigil_core::Error> for ApiError {
    fn from(err: vigil_core::Error) -> Self {
        match &err {
            vigil_core::Error::AlertNotFound(id) => {
                ApiError::NotFound(format!("Alert {} not found", id))
            }
            vigil_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            vigil_core::Error::Conflict(msg) => ApiError::Conflict(msg.clone()),
            vigil_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            vigil_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
            vigil_core::Error::Forbidden(msg) => ApiError::Forbidden(msg.clone()),
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
