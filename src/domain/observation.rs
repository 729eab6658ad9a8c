use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped load measurement.
///
/// `load` is `None` when the raw value could not be read as a finite number.
/// Such points are dropped when building training rows and are invisible to
/// inference lookups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub load: Option<f64>,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, load: f64) -> Self {
        Self {
            timestamp,
            load: Some(load).filter(|v| v.is_finite()),
        }
    }

    pub fn missing(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            load: None,
        }
    }
}

/// One step of a forecast run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl From<ForecastPoint> for Observation {
    fn from(point: ForecastPoint) -> Self {
        Observation::new(point.timestamp, point.value)
    }
}

/// Sort observations ascending by timestamp without reordering equal timestamps
pub fn sort_observations(observations: &mut [Observation]) {
    observations.sort_by_key(|o| o.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_non_finite_load_is_missing() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(Observation::new(ts, f64::NAN).load, None);
        assert_eq!(Observation::new(ts, f64::INFINITY).load, None);
        assert_eq!(Observation::new(ts, 3.5).load, Some(3.5));
    }

    #[test]
    fn test_sort_is_stable() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let mut obs = vec![
            Observation::new(t1, 1.0),
            Observation::new(t0, 2.0),
            Observation::new(t1, 3.0),
        ];
        sort_observations(&mut obs);
        assert_eq!(obs[0].load, Some(2.0));
        assert_eq!(obs[1].load, Some(1.0));
        assert_eq!(obs[2].load, Some(3.0));
    }
}
