//! Feature engineering for load forecasting
//!
//! Training rows are derived from an ordered observation slice. Inference
//! features are rebuilt for one target timestamp from a [`HistoryIndex`].

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

use super::history::HistoryIndex;
use crate::domain::{sort_observations, Cadence, Feature, Observation};

/// Calendar fields of a timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarFeatures {
    /// Hour of day (0-23)
    pub hours: f64,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: f64,
    /// Month (1-12)
    pub month: f64,
    /// 1.0 on Saturday and Sunday
    pub is_weekend: f64,
}

impl CalendarFeatures {
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        let day_of_week = timestamp.weekday().num_days_from_monday();
        Self {
            hours: timestamp.hour() as f64,
            day_of_week: day_of_week as f64,
            month: timestamp.month() as f64,
            is_weekend: if day_of_week >= 5 { 1.0 } else { 0.0 },
        }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Hours => Some(self.hours),
            Feature::DayOfWeek => Some(self.day_of_week),
            Feature::Month => Some(self.month),
            Feature::IsWeekend => Some(self.is_weekend),
            _ => None,
        }
    }
}

/// How training rows resolve lag and rolling features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LagAlignment {
    /// `lag_k` is the load `k` rows earlier; rolling windows count rows and
    /// include the current row
    Positional,
    /// Lags and rolling windows use the same exact-timestamp lookup as inference
    #[default]
    Calendar,
}

/// Observation plus its derived features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub load: f64,
    values: BTreeMap<Feature, f64>,
}

impl FeatureRow {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(&feature).copied()
    }

    /// Look a feature up by column name
    pub fn value(&self, column: &str) -> Option<f64> {
        Feature::from_str(column).ok().and_then(|f| self.get(f))
    }
}

/// Training table for one cadence
#[derive(Debug, Clone)]
pub struct FeatureTable {
    cadence: Cadence,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Derives calendar, lag and rolling features from an observation series
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer {
    alignment: LagAlignment,
}

impl FeatureEngineer {
    pub fn new(alignment: LagAlignment) -> Self {
        Self { alignment }
    }

    /// Hourly table: `hours`, `day_of_week`, `month`, `is_weekend`,
    /// `lag_1`, `lag_24`, `lag_168`, `rolling_24`
    pub fn transform(&self, observations: &[Observation]) -> FeatureTable {
        self.derive(observations, Cadence::Hourly)
    }

    /// Daily table: calendar fields without `hours`, `lag_1`, `lag_7`, `lag_30`,
    /// `rolling_7`, `rolling_30`
    pub fn transform_for_days(&self, observations: &[Observation]) -> FeatureTable {
        self.derive(observations, Cadence::Daily)
    }

    /// Build the table for `cadence`. Rows whose dependencies cannot be
    /// resolved are dropped.
    pub fn derive(&self, observations: &[Observation], cadence: Cadence) -> FeatureTable {
        let mut ordered = observations.to_vec();
        sort_observations(&mut ordered);

        let rows: Vec<FeatureRow> = match self.alignment {
            LagAlignment::Positional => {
                let loads: Vec<Option<f64>> = ordered.iter().map(|o| o.load).collect();
                ordered
                    .iter()
                    .enumerate()
                    .filter_map(|(i, obs)| positional_row(cadence, i, obs, &loads))
                    .collect()
            }
            LagAlignment::Calendar => {
                let history = HistoryIndex::from_observations(&ordered);
                ordered
                    .iter()
                    .filter_map(|obs| calendar_row(cadence, obs, &history))
                    .collect()
            }
        };

        debug!(
            cadence = %cadence,
            alignment = ?self.alignment,
            input_rows = ordered.len(),
            feature_rows = rows.len(),
            "derived feature table"
        );

        FeatureTable { cadence, rows }
    }
}

fn calendar_values(cadence: Cadence, timestamp: DateTime<Utc>) -> BTreeMap<Feature, f64> {
    let calendar = CalendarFeatures::from_timestamp(timestamp);
    cadence
        .calendar_features()
        .iter()
        .filter_map(|&f| calendar.get(f).map(|v| (f, v)))
        .collect()
}

fn positional_row(
    cadence: Cadence,
    index: usize,
    obs: &Observation,
    loads: &[Option<f64>],
) -> Option<FeatureRow> {
    let load = obs.load?;
    let mut values = calendar_values(cadence, obs.timestamp);

    for &feature in cadence.lag_features() {
        let k = feature.lag_offset()? as usize;
        let prior = index.checked_sub(k)?;
        values.insert(feature, loads[prior]?);
    }

    for &feature in cadence.rolling_features() {
        let size = feature.rolling_window()?.size as usize;
        let start = (index + 1).checked_sub(size)?;
        values.insert(feature, mean_of(&loads[start..=index])?);
    }

    Some(FeatureRow {
        timestamp: obs.timestamp,
        load,
        values,
    })
}

fn calendar_row(cadence: Cadence, obs: &Observation, history: &HistoryIndex) -> Option<FeatureRow> {
    let load = obs.load?;
    let mut values = calendar_values(cadence, obs.timestamp);

    for &feature in cadence.lag_features() {
        values.insert(feature, lag_value(history, cadence, obs.timestamp, feature)?);
    }
    for &feature in cadence.rolling_features() {
        values.insert(feature, rolling_value(history, cadence, obs.timestamp, feature)?);
    }

    Some(FeatureRow {
        timestamp: obs.timestamp,
        load,
        values,
    })
}

fn mean_of(window: &[Option<f64>]) -> Option<f64> {
    let sum = window.iter().copied().sum::<Option<f64>>()?;
    Some(sum / window.len() as f64)
}

fn steps_before(cadence: Cadence, target: DateTime<Utc>, steps: i64) -> DateTime<Utc> {
    target - cadence.unit() * steps as i32
}

/// Load recorded exactly `lag_offset` steps before `target`
pub fn lag_value(
    history: &HistoryIndex,
    cadence: Cadence,
    target: DateTime<Utc>,
    feature: Feature,
) -> Option<f64> {
    let k = feature.lag_offset()?;
    history.load_at(steps_before(cadence, target, k))
}

/// Mean load over `[anchor - (size - 1), anchor]`, where `anchor` is the
/// window's anchor lag before `target`. `None` unless the anchor is present.
pub fn rolling_value(
    history: &HistoryIndex,
    cadence: Cadence,
    target: DateTime<Utc>,
    feature: Feature,
) -> Option<f64> {
    let window = feature.rolling_window()?;
    let anchor = steps_before(cadence, target, window.anchor_lag);
    if !history.contains(anchor) {
        return None;
    }
    let start = steps_before(cadence, anchor, window.size - 1);
    history.window_mean(start, anchor)
}

/// Rebuild every feature of `cadence` for `target` from history.
///
/// Absent lag timestamps yield `0.0`. A rolling feature whose anchor is absent
/// takes the anchor lag's value, which is then `0.0` as well.
pub fn inference_features(
    cadence: Cadence,
    target: DateTime<Utc>,
    history: &HistoryIndex,
) -> BTreeMap<Feature, f64> {
    let mut values = calendar_values(cadence, target);

    for &feature in cadence.lag_features() {
        let value = lag_value(history, cadence, target, feature).unwrap_or(0.0);
        values.insert(feature, value);
    }

    for &feature in cadence.rolling_features() {
        let value = rolling_value(history, cadence, target, feature)
            .or_else(|| {
                let anchor_lag = feature.rolling_window()?.anchor_lag;
                history.load_at(steps_before(cadence, target, anchor_lag))
            })
            .unwrap_or(0.0);
        values.insert(feature, value);
    }

    values
}
