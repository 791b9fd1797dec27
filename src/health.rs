//! Health probes: GET /healthz, GET /readyz

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

const fn build_health_response(status: &'static str) -> HealthResponse {
    HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
    }
}

/// GET /healthz - the process is up
async fn healthz() -> Json<HealthResponse> {
    Json(build_health_response("ok"))
}

/// GET /readyz - manifests have been loaded at least once
async fn readyz(State(ready): State<Arc<AtomicBool>>) -> (StatusCode, Json<HealthResponse>) {
    if ready.load(Ordering::Acquire) {
        (StatusCode::OK, Json(build_health_response("ready")))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(build_health_response("starting")),
        )
    }
}

/// Create the probe router.
pub fn router(ready: Arc<AtomicBool>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(ready)
        .layer(TraceLayer::new_for_http())
}

/// Serve the probes until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(
    addr: SocketAddr,
    ready: Arc<AtomicBool>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Health probes listening");

    axum::serve(listener, router(ready))
        .with_graceful_shutdown(shutdown)
        .await
}
