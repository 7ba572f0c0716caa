mod error;
mod registry;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

pub use error::MetricsError;
pub use registry::PrometheusMetrics;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// HTTP-сервер с единственным эндпоинтом `GET /metrics`.
/// Останавливается по `shutdown`.
pub async fn run(
    port: u16,
    metrics: Arc<PrometheusMetrics>,
    shutdown: CancellationToken,
) -> Result<(), MetricsError> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| MetricsError::Bind { port, source })?;

    tracing::info!(port, "metrics server listening");

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(MetricsError::Serve)?;

    Ok(())
}

pub fn router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .with_state(metrics)
}

// --- GET /metrics ---

async fn handle_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics encode failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
