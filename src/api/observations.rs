use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{api::error::ApiError, controller::AppState, forecast::RawRecord};

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub received: usize,
    pub stored: usize,
}

/// POST /api/v1/observations
pub async fn ingest(
    State(st): State<AppState>,
    Json(records): Json<Vec<RawRecord>>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    if records.is_empty() {
        return Err(ApiError::BadRequest("no records supplied".to_string()));
    }

    let stored = st.service.ingest(&records).await?;
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            received: records.len(),
            stored,
        }),
    ))
}
