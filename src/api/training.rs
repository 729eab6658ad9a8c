use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    api::error::ApiError,
    controller::{AppState, TrainingReport},
    domain::Cadence,
    ml::ModelState,
};

/// POST /api/v1/train/:cadence
pub async fn train(
    State(st): State<AppState>,
    Path(cadence): Path<Cadence>,
) -> Result<Json<TrainingReport>, ApiError> {
    Ok(Json(st.service.train(cadence).await?))
}

/// GET /api/v1/model/:cadence
pub async fn get_model(
    State(st): State<AppState>,
    Path(cadence): Path<Cadence>,
) -> Result<Json<ModelState>, ApiError> {
    Ok(Json(st.service.model_state(cadence).await?))
}
