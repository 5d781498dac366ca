//! Training history across agent updates
//!
//! Every metric keeps one record per update. A record is the per-epoch
//! series the engine produced for that update, so its length is the number
//! of gradient steps that were applied before the loop ended or stopped.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::stats::UpdateStats;

/// Metrics tracked by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Clipped surrogate policy loss
    PolicyLoss,
    /// Weighted entropy loss
    EntropyLoss,
    /// Approximate KL divergence between old and new policy
    PolicyDiv,
    /// Clipped value loss
    ValueLoss,
    /// MSE between old and new value estimates
    ValueMse,
}

impl Metric {
    /// Every tracked metric, in recording order
    pub const ALL: [Metric; 5] = [
        Metric::PolicyLoss,
        Metric::EntropyLoss,
        Metric::PolicyDiv,
        Metric::ValueLoss,
        Metric::ValueMse,
    ];

    /// Stable name, also used as the JSON key
    pub fn name(self) -> &'static str {
        match self {
            Metric::PolicyLoss => "policy_loss",
            Metric::EntropyLoss => "entropy_loss",
            Metric::PolicyDiv => "policy_div",
            Metric::ValueLoss => "value_loss",
            Metric::ValueMse => "value_mse",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Append-only record of per-update metric series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingHistory {
    records: BTreeMap<String, Vec<Vec<f64>>>,
}

impl TrainingHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record to `metric`, creating its series on first use
    pub fn append(&mut self, metric: Metric, values: Vec<f64>) {
        self.records.entry(metric.name().to_string()).or_default().push(values);
    }

    /// Append every series of one update
    pub fn record(&mut self, stats: &UpdateStats) {
        self.append(Metric::PolicyLoss, stats.policy.policy_loss.clone());
        self.append(Metric::EntropyLoss, stats.policy.entropy_loss.clone());
        self.append(Metric::PolicyDiv, stats.policy.kl.clone());
        self.append(Metric::ValueLoss, stats.value.value_loss.clone());
        self.append(Metric::ValueMse, stats.value.mse.clone());
    }

    /// All records of `metric`, oldest first
    pub fn get(&self, metric: Metric) -> Option<&[Vec<f64>]> {
        self.get_by_name(metric.name())
    }

    /// All records stored under `name`
    pub fn get_by_name(&self, name: &str) -> Option<&[Vec<f64>]> {
        self.records.get(name).map(Vec::as_slice)
    }

    /// Most recent record of `metric`
    pub fn latest(&self, metric: Metric) -> Option<&[f64]> {
        self.records.get(metric.name())?.last().map(Vec::as_slice)
    }

    /// Names of the metrics recorded so far
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Number of updates recorded (length of the longest series)
    pub fn num_updates(&self) -> usize {
        self.records.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the history as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write training history {}", path.display()))?;
        Ok(())
    }

    /// Read a history previously written by [`TrainingHistory::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read training history {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse training history {}", path.display()))
    }
}
