use chrono::Duration;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Fixed time unit between observations used for feature derivation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Cadence {
    Hourly,
    Daily,
}

impl Cadence {
    pub const ALL: [Cadence; 2] = [Cadence::Hourly, Cadence::Daily];

    /// Length of one step at this cadence
    pub fn unit(&self) -> Duration {
        match self {
            Self::Hourly => Duration::hours(1),
            Self::Daily => Duration::days(1),
        }
    }

    /// Calendar fields derived from the timestamp alone
    pub fn calendar_features(&self) -> &'static [Feature] {
        match self {
            Self::Hourly => &[
                Feature::Hours,
                Feature::DayOfWeek,
                Feature::Month,
                Feature::IsWeekend,
            ],
            Self::Daily => &[Feature::DayOfWeek, Feature::Month, Feature::IsWeekend],
        }
    }

    pub fn lag_features(&self) -> &'static [Feature] {
        match self {
            Self::Hourly => &[Feature::Lag1, Feature::Lag24, Feature::Lag168],
            Self::Daily => &[Feature::Lag1, Feature::Lag7, Feature::Lag30],
        }
    }

    pub fn rolling_features(&self) -> &'static [Feature] {
        match self {
            Self::Hourly => &[Feature::Rolling24],
            Self::Daily => &[Feature::Rolling7, Feature::Rolling30],
        }
    }

    /// Feature set used when the caller does not pick one.
    ///
    /// `rolling_30` is derived for the daily cadence but is not part of this set;
    /// callers opt into it by listing it explicitly.
    pub fn default_features(&self) -> &'static [Feature] {
        match self {
            Self::Hourly => &[
                Feature::Hours,
                Feature::DayOfWeek,
                Feature::Month,
                Feature::IsWeekend,
                Feature::Lag1,
                Feature::Lag24,
                Feature::Lag168,
                Feature::Rolling24,
            ],
            Self::Daily => &[
                Feature::DayOfWeek,
                Feature::Month,
                Feature::IsWeekend,
                Feature::Lag1,
                Feature::Lag7,
                Feature::Lag30,
                Feature::Rolling7,
            ],
        }
    }

    pub fn default_feature_cols(&self) -> Vec<String> {
        self.default_features()
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    /// Number of leading rows that cannot carry every lag/rolling feature
    pub fn max_dependency(&self) -> usize {
        let lags = self
            .lag_features()
            .iter()
            .filter_map(|f| f.lag_offset())
            .max()
            .unwrap_or(0);
        let windows = self
            .rolling_features()
            .iter()
            .filter_map(|f| f.rolling_window())
            .map(|w| w.size - 1)
            .max()
            .unwrap_or(0);
        lags.max(windows) as usize
    }
}

/// Trailing window definition of a rolling feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    /// Number of steps in the window, inclusive of its newest point
    pub size: i64,
    /// Lag (in steps) of the window's newest point at inference time
    pub anchor_lag: i64,
}

/// Named model input column
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum Feature {
    #[strum(serialize = "hours")]
    Hours,
    #[strum(serialize = "day_of_week")]
    DayOfWeek,
    #[strum(serialize = "month")]
    Month,
    #[strum(serialize = "is_weekend")]
    IsWeekend,
    #[strum(serialize = "lag_1")]
    Lag1,
    #[strum(serialize = "lag_7")]
    Lag7,
    #[strum(serialize = "lag_24")]
    Lag24,
    #[strum(serialize = "lag_30")]
    Lag30,
    #[strum(serialize = "lag_168")]
    Lag168,
    #[strum(serialize = "rolling_7")]
    Rolling7,
    #[strum(serialize = "rolling_24")]
    Rolling24,
    #[strum(serialize = "rolling_30")]
    Rolling30,
}

impl Feature {
    /// Steps back for lag features
    pub fn lag_offset(&self) -> Option<i64> {
        match self {
            Self::Lag1 => Some(1),
            Self::Lag7 => Some(7),
            Self::Lag24 => Some(24),
            Self::Lag30 => Some(30),
            Self::Lag168 => Some(168),
            _ => None,
        }
    }

    pub fn rolling_window(&self) -> Option<RollingWindow> {
        let size = match self {
            Self::Rolling7 => 7,
            Self::Rolling24 => 24,
            Self::Rolling30 => 30,
            _ => return None,
        };
        Some(RollingWindow {
            size,
            anchor_lag: size,
        })
    }
}
