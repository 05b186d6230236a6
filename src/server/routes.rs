use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::{ChartSource, ServerState};
use crate::axis::AxisValues;

pub fn routes() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/", get(chart_page))
        .route("/api/axis", get(api_axis))
        .route("/health", get(health))
}

/// Run the configured query on the blocking pool.
async fn fetch(state: &Arc<ServerState>) -> Result<AxisValues, ApiError> {
    let source = Arc::clone(&state.source);
    let query = Arc::clone(&state.query);
    let axis = tokio::task::spawn_blocking(move || source.fetch_axis_value(&query)).await??;
    tracing::debug!(points = axis.len(), "fetched axis values");
    Ok(axis)
}

async fn chart_page(State(state): State<Arc<ServerState>>) -> Result<Html<String>, ApiError> {
    match &state.chart {
        ChartSource::Prebuilt(chart) => Ok(Html(chart.render())),
        ChartSource::Default(template) => {
            let axis = fetch(&state).await?;
            Ok(Html(template.build(axis).render()))
        }
    }
}

async fn api_axis(State(state): State<Arc<ServerState>>) -> Result<Json<AxisValues>, ApiError> {
    fetch(&state).await.map(Json)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
