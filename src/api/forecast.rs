use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    api::error::ApiError,
    controller::AppState,
    domain::{Cadence, ForecastPoint},
};

#[derive(Debug, Deserialize, Validate)]
pub struct HourlyForecastRequest {
    #[validate(range(min = 1, message = "hours must be at least 1"))]
    pub hours: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DailyForecastRequest {
    #[validate(range(min = 1, message = "days must be at least 1"))]
    pub days: u32,
}

/// One forecast step as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPointDto {
    /// ISO-8601 timestamp
    pub timestamp: String,
    pub prediction: f64,
}

impl From<ForecastPoint> for ForecastPointDto {
    fn from(point: ForecastPoint) -> Self {
        Self {
            timestamp: point.timestamp.to_rfc3339(),
            prediction: point.value,
        }
    }
}

/// POST /api/v1/forecast/hours
pub async fn forecast_hours(
    State(st): State<AppState>,
    Json(req): Json<HourlyForecastRequest>,
) -> Result<Json<Vec<ForecastPointDto>>, ApiError> {
    req.validate()?;
    run_forecast(&st, Cadence::Hourly, req.hours).await
}

/// POST /api/v1/forecast/days
pub async fn forecast_days(
    State(st): State<AppState>,
    Json(req): Json<DailyForecastRequest>,
) -> Result<Json<Vec<ForecastPointDto>>, ApiError> {
    req.validate()?;
    run_forecast(&st, Cadence::Daily, req.days).await
}

async fn run_forecast(
    st: &AppState,
    cadence: Cadence,
    horizon: u32,
) -> Result<Json<Vec<ForecastPointDto>>, ApiError> {
    let max = st.cfg.forecast.max_horizon(cadence);
    if horizon > max {
        return Err(ApiError::ValidationError(format!(
            "{cadence} horizon {horizon} exceeds the maximum of {max}"
        )));
    }

    let points = st.service.forecast(cadence, horizon as usize).await?;
    Ok(Json(points.into_iter().map(ForecastPointDto::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_request_validation() {
        assert!(HourlyForecastRequest { hours: 0 }.validate().is_err());
        assert!(HourlyForecastRequest { hours: 24 }.validate().is_ok());
        assert!(DailyForecastRequest { days: 0 }.validate().is_err());
    }

    #[test]
    fn test_point_serializes_as_iso() {
        let dto = ForecastPointDto::from(ForecastPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap(),
            value: 42.5,
        });
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T13:00:00+00:00");
        assert_eq!(json["prediction"], 42.5);
    }
}
