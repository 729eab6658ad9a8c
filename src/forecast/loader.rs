//! Raw record loading
//!
//! Turns loosely typed records (JSON documents or CSV rows) into a sorted
//! observation series. Unreadable timestamps drop the record; unreadable
//! loads keep the timestamp with a missing load.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{sort_observations, Observation};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("CSV is missing the '{0}' column")]
    MissingColumn(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Record as stored by the ingestion side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "Timestamp")]
    pub timestamp: Option<String>,
    #[serde(default, alias = "Load")]
    pub load: serde_json::Value,
}

impl RawRecord {
    pub fn new(timestamp: impl Into<String>, load: impl Into<serde_json::Value>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            load: load.into(),
        }
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse RFC 3339 or a naive date/time (taken as UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Coerce a JSON value to a finite number
pub fn coerce_load(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Converts raw records into a time-ordered observation series
pub struct TimeSeriesLoader;

impl TimeSeriesLoader {
    pub fn from_records(records: &[RawRecord]) -> Vec<Observation> {
        let mut dropped = 0usize;
        let mut missing_load = 0usize;

        let mut observations: Vec<Observation> = records
            .iter()
            .filter_map(|record| {
                let Some(timestamp) = record.timestamp.as_deref().and_then(parse_timestamp) else {
                    dropped += 1;
                    return None;
                };
                Some(match coerce_load(&record.load) {
                    Some(load) => Observation::new(timestamp, load),
                    None => {
                        missing_load += 1;
                        Observation::missing(timestamp)
                    }
                })
            })
            .collect();

        sort_observations(&mut observations);

        if dropped > 0 {
            warn!(dropped, "records without a readable timestamp were skipped");
        }
        debug!(
            records = records.len(),
            observations = observations.len(),
            missing_load,
            "loaded time series"
        );

        observations
    }

    /// Read a CSV with `Timestamp` and `Load` columns (header match is case-insensitive)
    pub fn load_csv<R: Read>(reader: R) -> Result<Vec<Observation>, LoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or(LoaderError::MissingColumn(name))
        };
        let ts_idx = column("timestamp")?;
        let load_idx = column("load")?;

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            records.push(RawRecord {
                timestamp: row.get(ts_idx).map(str::to_string),
                load: row
                    .get(load_idx)
                    .map(|v| serde_json::Value::String(v.to_string()))
                    .unwrap_or_default(),
            });
        }

        Ok(Self::from_records(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-06-01T13:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T15:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01 13:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-06-01"),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_coerce_load() {
        assert_eq!(coerce_load(&json!(12.5)), Some(12.5));
        assert_eq!(coerce_load(&json!(" 7 ")), Some(7.0));
        assert_eq!(coerce_load(&json!("n/a")), None);
        assert_eq!(coerce_load(&json!(null)), None);
        assert_eq!(coerce_load(&json!("NaN")), None);
    }

    #[test]
    fn test_records_sorted_and_filtered() {
        let records: Vec<RawRecord> = serde_json::from_value(json!([
            { "Timestamp": "2024-01-01 02:00:00", "Load": "3.0", "id": "a" },
            { "Timestamp": "garbage", "Load": 1.0 },
            { "timestamp": "2024-01-01 00:00:00", "load": 1.0 },
            { "Timestamp": "2024-01-01 01:00:00", "Load": "?" },
            { "Load": 9.0 }
        ]))
        .unwrap();

        let obs = TimeSeriesLoader::from_records(&records);
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].load, Some(1.0));
        assert_eq!(obs[1].load, None);
        assert_eq!(obs[2].load, Some(3.0));
        assert!(obs.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_load_csv() {
        let data = "Timestamp,Load\n2024-01-01 01:00:00,20\n2024-01-01 00:00:00, 10.5\n";
        let obs = TimeSeriesLoader::load_csv(data.as_bytes()).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].load, Some(10.5));

        let err = TimeSeriesLoader::load_csv("time,value\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn("timestamp")));
    }
}
