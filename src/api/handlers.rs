use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        name: state.settings().api().project_name.clone(),
        version: state.settings().api().version.clone(),
    })
}

pub(crate) async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(state.db()).await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(err) => {
            tracing::warn!(error = %err, "Health check failed to reach the database");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "degraded" }))
        }
    }
}

pub(crate) async fn metrics() -> (StatusCode, String) {
    match metrics::render() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}
