use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::health::HealthChecker;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::server::McpServer;
use crate::metrics::Metrics;

#[derive(Clone)]
struct AppState {
    server: Arc<McpServer>,
    health: Arc<HealthChecker>,
}

/// Transport 2: `POST /mcp` carrying the JSON-RPC envelope, plus the
/// health/readiness/version endpoints. JSON-RPC failures still answer 200;
/// the error lives inside the envelope.
pub async fn serve(
    server: Arc<McpServer>,
    health: Arc<HealthChecker>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let state = AppState { server, health };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/mcp", post(mcp_endpoint))
        .route("/health", get(health_endpoint))
        .route("/ready", get(ready_endpoint))
        .route("/version", get(version_endpoint))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http transport ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn mcp_endpoint(
    State(state): State<AppState>,
    body: String,
) -> Json<JsonRpcResponse> {
    let response = match serde_json::from_str::<JsonRpcRequest>(&body) {
        Ok(request) => state.server.handle(request).await,
        Err(e) => Some(JsonRpcResponse::parse_error(e)),
    };

    // Notifications have no response body; answer with an empty success
    // envelope so HTTP callers always get valid JSON back.
    Json(response.unwrap_or_else(|| {
        JsonRpcResponse::success(serde_json::Value::Null, serde_json::json!({}))
    }))
}

async fn health_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check();
    let status = if report.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn ready_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check();
    let ready = report.status == "ok";
    (
        if ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        },
        Json(serde_json::json!({
            "ready": ready,
            "timestamp": report.timestamp,
        })),
    )
}

async fn version_endpoint() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Secondary listener for Prometheus scraping, enabled by configuration.
pub async fn serve_metrics(
    metrics: Arc<Metrics>,
    addr: SocketAddr,
    path: String,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route(path.as_str(), get(metrics_endpoint))
        .with_state(metrics);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %path, "metrics listener ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn metrics_endpoint(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
}
