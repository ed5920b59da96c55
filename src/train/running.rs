use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::history::Metrics;

/// Phase-scoped accumulator of per-batch metrics.
///
/// Keeps a running sum and count per key, so `average` costs one division
/// per key instead of re-summing every recorded value. A fresh instance is
/// created for every training and validation phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistics {
    totals: BTreeMap<String, (f64, usize)>,
    updates: usize,
}

impl RunningStatistics {
    pub fn new() -> RunningStatistics {
        RunningStatistics::default()
    }

    /// Folds one batch worth of metrics in.
    pub fn update<I, K, V>(&mut self, metrics: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<f64>,
    {
        for (key, value) in metrics {
            let (sum, count) = self.totals.entry(key.into()).or_insert((0.0, 0));
            *sum += value.into();
            *count += 1;
        }
        self.updates += 1;
    }

    /// Folds `other` in, summing totals and counts key by key. A key's mean
    /// afterwards is the mean over the values both sides recorded for it.
    pub fn merge(&mut self, other: RunningStatistics) {
        for (key, (sum, count)) in other.totals {
            let (total, seen) = self.totals.entry(key).or_insert((0.0, 0));
            *total += sum;
            *seen += count;
        }
        self.updates += other.updates;
    }

    /// Mean of every value seen so far, per key. Empty before the first
    /// update; a key only exists once it has at least one value.
    pub fn average(&self) -> Metrics {
        self.totals
            .iter()
            .map(|(key, (sum, count))| (key.clone(), sum / *count as f64))
            .collect()
    }

    /// Number of values recorded under `key`.
    pub fn count(&self, key: &str) -> usize {
        self.totals.get(key).map(|(_, count)| *count).unwrap_or(0)
    }

    /// Number of `update` calls, i.e. batches folded in.
    pub fn num_updates(&self) -> usize {
        self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
