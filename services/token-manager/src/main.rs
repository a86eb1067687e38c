//! Augment Token Manager
//!
//! Single-binary Rust service that:
//! 1. Gates an admin API behind a shared password and Redis-backed sessions
//! 2. Hands out Augment PKCE authorization URLs
//! 3. Exchanges pasted authorization codes for access tokens
//! 4. Stores, lists, annotates and deletes those tokens in Redis

mod api;
mod config;
mod error;
mod metrics;
mod session;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use augment_auth::FlowRegistry;
use axum::Router;
use axum::extract::State;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use token_store::{AccessPolicy, KvStore, RedisStore, SessionManager, TokenStore};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Startup budget for the first store round trip.
const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the health check's store ping.
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on a single code exchange round trip.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionManager>,
    tokens: TokenStore,
    flows: Arc<FlowRegistry>,
    store: Arc<dyn KvStore>,
    http_client: reqwest::Client,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

impl AppState {
    fn new(
        store: Arc<dyn KvStore>,
        policy: AccessPolicy,
        flows: FlowRegistry,
        http_client: reqwest::Client,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(store.clone(), policy)),
            tokens: TokenStore::new(store.clone()),
            flows: Arc::new(flows),
            store,
            http_client,
            started_at: Instant::now(),
            prometheus,
        }
    }
}

/// Cross-origin access from any origin, with credentials.
///
/// Origin, methods and headers are mirrored from the request; wildcards
/// cannot be combined with credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the axum router with all routes and shared state.
///
/// Admin routes sit behind the session gate; login, logout, health and
/// metrics do not. CORS and the concurrency limit apply to everything.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let protected = Router::new()
        .route("/api/auth", get(api::authorize_url))
        .route("/api/callback", post(api::callback))
        .route("/api/tokens", get(api::list_tokens))
        .route("/api/token/{token}", delete(api::delete_token))
        .route("/api/token/{token}/remark", put(api::update_remark))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/api/login", post(api::login))
        .route("/api/logout", post(api::logout))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(cors_layer())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting augment-token-manager");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        max_connections = config.server.max_connections,
        flow_ttl_secs = config.oauth.flow_ttl_secs,
        "configuration loaded"
    );

    // validate() guarantees the URL is present
    let store_url = config
        .store
        .url
        .as_ref()
        .context("store connection string missing")?;

    let store = tokio::time::timeout(STORE_CONNECT_TIMEOUT, async {
        let store = RedisStore::connect(store_url.expose()).await?;
        store.ping().await?;
        Ok::<_, token_store::Error>(store)
    })
    .await
    .context("timed out connecting to store")?
    .context("failed to connect to store")?;
    info!("store connected");

    let policy = AccessPolicy::from_password(config.auth.access_password.clone());
    if policy.is_open() {
        warn!("no access password configured, admin API is open to every caller");
    }

    let flows = FlowRegistry::new(Duration::from_secs(config.oauth.flow_ttl_secs));
    let initial = flows.begin().await;
    info!(
        state = %initial.state,
        flow_ttl_secs = flows.ttl().as_secs(),
        "initial authorization flow ready"
    );

    let http_client = reqwest::Client::builder()
        .timeout(EXCHANGE_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let app_state = AppState::new(
        Arc::new(store),
        policy,
        flows,
        http_client,
        prometheus_handle,
    );
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: 200 when the store answers a ping, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let reachable = matches!(
        tokio::time::timeout(HEALTH_PING_TIMEOUT, state.store.ping()).await,
        Ok(Ok(()))
    );

    let (status_code, body) = if reachable {
        (
            axum::http::StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "store": "connected",
                "uptime_seconds": uptime,
            }),
        )
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "degraded",
                "store": "unreachable",
                "uptime_seconds": uptime,
            }),
        )
    };

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::Secret;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use token_store::MemoryStore;
    use tower::ServiceExt;

    const PASSWORD: &str = "hunter2";

    /// Create a PrometheusHandle for tests without installing a global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    fn gated() -> AccessPolicy {
        AccessPolicy::from_password(Some(Secret::new(PASSWORD.to_string())))
    }

    fn test_app(policy: AccessPolicy) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            policy,
            FlowRegistry::default(),
            reqwest::Client::new(),
            test_prometheus_handle(),
        );
        (build_router(state, 1000), store)
    }

    /// Requests the mock tenant received, as parsed JSON bodies.
    type Received = Arc<Mutex<Vec<Value>>>;

    /// Start a mock tenant whose `/token` endpoint answers with `status` and
    /// `body`, recording every exchange request it sees.
    async fn start_tenant(status: StatusCode, body: Value) -> (String, Received) {
        let received: Received = Arc::default();
        let seen = received.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().route(
            "/token",
            post(move |axum::Json(request): axum::Json<Value>| {
                let seen = seen.clone();
                let body = body.clone();
                async move {
                    seen.lock().unwrap().push(request);
                    (status, axum::Json(body))
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/"), received)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = session {
            builder = builder.header("x-auth-token", token);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn login(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/login",
            None,
            Some(json!({ "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    #[tokio::test]
    async fn full_token_lifecycle() {
        let (tenant_url, _) =
            start_tenant(StatusCode::OK, json!({ "access_token": "at_lifecycle" })).await;
        let (app, _) = test_app(gated());
        let session = login(&app).await;

        let (status, body) = send(&app, "GET", "/api/tokens", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);

        let (status, _) = send(&app, "GET", "/api/auth", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/api/callback",
            Some(&session),
            Some(json!({ "code": "c0de", "tenant_url": tenant_url })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "callback failed: {body}");
        assert_eq!(body["token"], "at_lifecycle");

        let (_, body) = send(&app, "GET", "/api/tokens", Some(&session), None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["tokens"][0]["token"], "at_lifecycle");
        assert_eq!(body["tokens"][0]["tenant_url"], tenant_url.as_str());
        assert_eq!(body["tokens"][0]["remark"], "");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/token/at_lifecycle/remark",
            Some(&session),
            Some(json!({ "remark": "personal" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", "/api/tokens", Some(&session), None).await;
        assert_eq!(body["tokens"][0]["remark"], "personal");

        let (status, _) = send(
            &app,
            "DELETE",
            "/api/token/at_lifecycle",
            Some(&session),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", "/api/tokens", Some(&session), None).await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["tokens"], json!([]));
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let (app, _) = test_app(gated());
        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({ "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "invalid password");
    }

    #[tokio::test]
    async fn login_rejects_malformed_body() {
        let (app, _) = test_app(gated());
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", "/api/login", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_reports_store_failure() {
        let (app, store) = test_app(gated());
        store.set_unavailable(true);
        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({ "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("store error"));
    }

    #[tokio::test]
    async fn protected_routes_require_session() {
        let (app, _) = test_app(gated());
        for (method, uri) in [
            ("GET", "/api/auth"),
            ("GET", "/api/tokens"),
            ("DELETE", "/api/token/at_1"),
        ] {
            let (status, body) = send(&app, method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["status"], "error");
        }

        let (status, _) = send(&app, "GET", "/api/tokens", Some("never-issued"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_accepted_from_query_and_cookie() {
        let (app, _) = test_app(gated());
        let session = login(&app).await;

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/tokens?token={session}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/tokens")
                    .header("cookie", format!("auth_token={session}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn header_takes_precedence_over_cookie() {
        let (app, _) = test_app(gated());
        let session = login(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/tokens")
                    .header("x-auth-token", "bogus")
                    .header("cookie", format!("auth_token={session}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_revokes_session_and_always_succeeds() {
        let (app, _) = test_app(gated());
        let session = login(&app).await;

        let (status, body) = send(&app, "POST", "/api/logout", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (status, _) = send(&app, "GET", "/api/tokens", Some(&session), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "POST", "/api/logout", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_succeeds_when_store_is_down() {
        let (app, store) = test_app(gated());
        let session = login(&app).await;
        store.set_unavailable(true);

        let (status, body) = send(&app, "POST", "/api/logout", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn open_mode_admits_everyone() {
        let (app, _) = test_app(AccessPolicy::Open);
        let (status, _) = send(&app, "GET", "/api/tokens", None, None).await;
        assert_eq!(status, StatusCode::OK);

    }

    #[tokio::test]
    async fn open_mode_login_rejects_every_password() {
        let (app, store) = test_app(AccessPolicy::Open);
        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({ "password": "anything" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid password");
        assert!(store.keys("session_token:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn authorize_url_is_stable_and_bound_to_exchange() {
        let (tenant_url, received) =
            start_tenant(StatusCode::OK, json!({ "access_token": "at_pkce" })).await;
        let (app, _) = test_app(AccessPolicy::Open);

        let (_, first) = send(&app, "GET", "/api/auth", None, None).await;
        let (_, second) = send(&app, "GET", "/api/auth", None, None).await;
        let url = first["authorize_url"].as_str().unwrap().to_string();
        assert_eq!(url, second["authorize_url"].as_str().unwrap());
        assert!(url.starts_with("https://auth.augmentcode.com/authorize?"));
        assert_eq!(query_param(&url, "prompt"), "login");

        let state = query_param(&url, "state");
        let (status, _) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "code": "c0de", "tenant_url": tenant_url, "state": state })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let requests = received.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        let exchange = &requests[0];
        assert_eq!(exchange["grant_type"], "authorization_code");
        assert_eq!(exchange["client_id"], "v");
        assert_eq!(exchange["code"], "c0de");
        assert_eq!(exchange["redirect_uri"], "");
        let verifier = exchange["code_verifier"].as_str().unwrap();
        assert_eq!(
            augment_auth::compute_challenge(verifier),
            query_param(&url, "code_challenge")
        );

        // The completed flow is retired, so a new URL is minted.
        let (_, third) = send(&app, "GET", "/api/auth", None, None).await;
        assert_ne!(third["authorize_url"].as_str().unwrap(), url);
    }

    #[tokio::test]
    async fn callback_validates_input() {
        let (app, _) = test_app(AccessPolicy::Open);

        let (status, _) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "tenant_url": "https://d0.example/" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "code": "c0de" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, "GET", "/api/auth", None, None).await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "code": "c0de", "tenant_url": "ftp://d0.example/" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({
                "code": "c0de",
                "tenant_url": "https://d0.example/",
                "state": "unknown",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn callback_without_any_flow_is_rejected() {
        let (app, _) = test_app(AccessPolicy::Open);
        let (status, _) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "code": "c0de", "tenant_url": "https://d0.example/" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_surfaces_exchange_failures() {
        let (app, _) = test_app(AccessPolicy::Open);
        send(&app, "GET", "/api/auth", None, None).await;

        let (rejecting, _) =
            start_tenant(StatusCode::BAD_REQUEST, json!({ "error": "invalid_grant" })).await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "code": "c0de", "tenant_url": rejecting })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("failed to obtain access token")
        );

        let (tokenless, _) = start_tenant(StatusCode::OK, json!({ "token_type": "bearer" })).await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "code": "c0de", "tenant_url": tokenless })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, body) = send(&app, "GET", "/api/tokens", None, None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn callback_reports_save_failure() {
        let (tenant_url, _) =
            start_tenant(StatusCode::OK, json!({ "access_token": "at_lost" })).await;
        let (app, store) = test_app(AccessPolicy::Open);
        send(&app, "GET", "/api/auth", None, None).await;
        store.set_unavailable(true);

        let (status, body) = send(
            &app,
            "POST",
            "/api/callback",
            None,
            Some(json!({ "code": "c0de", "tenant_url": tenant_url })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("failed to save token")
        );
    }

    #[tokio::test]
    async fn missing_tokens_are_not_found() {
        let (app, _) = test_app(AccessPolicy::Open);
        let (status, body) = send(&app, "DELETE", "/api/token/ghost", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/token/ghost/remark",
            None,
            Some(json!({ "remark": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_reports_store_failure() {
        let (app, store) = test_app(AccessPolicy::Open);
        store.set_unavailable(true);
        let (status, body) = send(&app, "GET", "/api/tokens", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn health_reflects_store_reachability() {
        let (app, store) = test_app(gated());

        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "connected");
        assert!(body["uptime_seconds"].is_u64());

        store.set_unavailable(true);
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["store"], "unreachable");
    }

    #[tokio::test]
    async fn metrics_endpoint_is_public_prometheus_text() {
        let (app, _) = test_app(gated());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn cors_preflight_mirrors_origin_with_credentials() {
        let (app, _) = test_app(gated());
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/tokens")
                    .header("origin", "https://admin.example")
                    .header("access-control-request-method", "GET")
                    .header("access-control-request-headers", "x-auth-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "https://admin.example"
        );
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert!(
            headers["access-control-allow-headers"]
                .to_str()
                .unwrap()
                .contains("x-auth-token")
        );
    }

    #[tokio::test]
    async fn cors_headers_on_simple_requests() {
        let (app, _) = test_app(gated());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let (app, _) = test_app(gated());
        let (status, _) = send(&app, "GET", "/api/unknown", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
