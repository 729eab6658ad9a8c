//! Timestamp-keyed view of load history
//!
//! Lookups are exact: a lag feature for `t - k` only resolves when an
//! observation carries exactly that timestamp.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::Observation;

#[derive(Debug, Clone, Copy, Default)]
struct LoadSlot {
    sum: f64,
    count: usize,
}

/// Ordered index of present loads by timestamp.
///
/// Several observations sharing a timestamp are kept as a running sum so a
/// point lookup returns their mean and a window mean weights each row once.
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    slots: BTreeMap<DateTime<Utc>, LoadSlot>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl HistoryIndex {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut index = Self::default();
        for obs in observations {
            index.push(*obs);
        }
        index
    }

    /// Add an observation. Missing loads still advance the last known timestamp.
    pub fn push(&mut self, obs: Observation) {
        self.last_timestamp = Some(match self.last_timestamp {
            Some(last) => last.max(obs.timestamp),
            None => obs.timestamp,
        });

        if let Some(load) = obs.load {
            let slot = self.slots.entry(obs.timestamp).or_default();
            slot.sum += load;
            slot.count += 1;
        }
    }

    /// Mean load recorded at exactly `timestamp`
    pub fn load_at(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.slots
            .get(&timestamp)
            .map(|slot| slot.sum / slot.count as f64)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.slots.contains_key(&timestamp)
    }

    /// Mean of every row with a timestamp in `[start, end]`
    pub fn window_mean(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
        if start > end {
            return None;
        }
        let (sum, count) = self
            .slots
            .range(start..=end)
            .fold((0.0, 0usize), |(sum, count), (_, slot)| {
                (sum + slot.sum, count + slot.count)
            });
        (count > 0).then(|| sum / count as f64)
    }

    /// Latest timestamp seen, including observations without a load
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Number of distinct timestamps with a present load
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
