//! HTTP chart surface: three JSON endpoints over a frozen [`ChartData`]
//! snapshot plus a static front-end mount.

mod error;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use qs_core::ChartData;

pub use error::ApiError;

/// Assemble the chart router over a finalized snapshot.
pub fn router(chart: Arc<ChartData>, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/bars", get(bars))
        .route("/plots", get(plots))
        .route("/lines", get(lines))
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(CorsLayer::permissive())
        .with_state(chart)
}

/// GET /bars — every bar with nullable OHLCV fields.
async fn bars(State(chart): State<Arc<ChartData>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(serde_json::to_value(&chart.bars)?))
}

/// GET /plots — the finalized plot store, keyed by label.
async fn plots(State(chart): State<Arc<ChartData>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(serde_json::to_value(&chart.plots)?))
}

/// GET /lines — the finalized line store.
async fn lines(State(chart): State<Arc<ChartData>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(serde_json::to_value(&chart.lines)?))
}

/// Serve the chart until ctrl-c.
pub async fn serve(chart: ChartData, port: u16, static_dir: PathBuf) -> std::io::Result<()> {
    let app = router(Arc::new(chart), static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("chart server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, gracefully stopping…");
}
