use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::controller::AppState;

use super::{forecast, observations, training};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/forecast/hours", post(forecast::forecast_hours))
        .route("/forecast/days", post(forecast::forecast_days))
        .route("/train/:cadence", post(training::train))
        .route("/model/:cadence", get(training::get_model))
        .route("/observations", post(observations::ingest))
        .with_state(state)
}

pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now(),
        })),
    )
}
