//! WHOOP OAuth server
//!
//! Single-binary service that:
//! 1. Sends the user through WHOOP's authorization-code flow
//! 2. Persists the resulting token pair to a local file
//! 3. Refreshes the access token lazily once it expires
//! 4. Serves read-only WHOOP data with the current token

mod config;
mod data;
mod error;
mod metrics;
mod oauth;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use common::{Clock, SystemClock};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whoop_api::WhoopClient;
use whoop_auth::{FileTokenStore, HttpExchanger};
use whoop_session::Session;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::metrics::ServiceMetrics;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub session: Arc<Session>,
    pub whoop: Arc<WhoopClient>,
    pub clock: Arc<dyn Clock>,
    pub metrics: ServiceMetrics,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .merge(oauth::routes())
        .merge(data::routes())
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            track_requests,
        ))
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

    info!("starting whoop-oauth-server");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), exists = config_path.exists(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        redirect_uri = %config.whoop.redirect_uri,
        api_base_url = %config.whoop.api_base_url,
        token_file = %config.storage.token_file.display(),
        client_configured = config.client_configured(),
        "configuration loaded"
    );
    if !config.client_configured() {
        warn!("WHOOP_CLIENT_ID / WHOOP_CLIENT_SECRET not set, authorization will be refused");
    }

    let settings = Arc::new(config.oauth_settings());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http = reqwest::Client::new();

    let exchanger = Arc::new(HttpExchanger::new(
        http.clone(),
        settings.clone(),
        clock.clone(),
    ));
    let store = Arc::new(FileTokenStore::new(&config.storage.token_file));
    let session = Session::new(settings, store, exchanger, clock.clone())
        .await
        .context("failed to read stored tokens")?;

    let whoop = WhoopClient::new(http, config.whoop.api_base_url.clone(), config.timeout());
    let metrics = ServiceMetrics::new();

    let app_state = AppState {
        session: Arc::new(session),
        whoop: Arc::new(whoop),
        clock,
        metrics: metrics.clone(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race it against the timer.
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
            let remaining = metrics.in_flight.load(Ordering::Relaxed);
            warn!(
                remaining,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Count, time, and label every request.
async fn track_requests(
    State(service_metrics): State<ServiceMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let started = Instant::now();
    service_metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    service_metrics.in_flight.fetch_add(1, Ordering::Relaxed);

    let response = next.run(request).await;

    service_metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
    let status = response.status();
    if status.is_server_error() {
        service_metrics.errors_total.fetch_add(1, Ordering::Relaxed);
    }
    metrics::record_request(status.as_u16(), &method, started.elapsed().as_secs_f64());
    response
}

/// Health endpoint: uptime, requests served, session state.
/// Returns 503 when the token store cannot be read.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let errors = state.metrics.errors_total.load(Ordering::Relaxed);
    let client_configured = state.session.has_credentials();

    let (status_code, body) = match state.session.status().await {
        Ok(session) => (
            axum::http::StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "session": session.label(),
                "client_configured": client_configured,
                "uptime_seconds": uptime,
                "requests_served": requests,
                "errors_total": errors,
            }),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "degraded",
                "session": "unknown",
                "error": e.to_string(),
                "client_configured": client_configured,
                "uptime_seconds": uptime,
                "requests_served": requests,
                "errors_total": errors,
            }),
        ),
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
