//! PPO configuration and hyperparameters
//!
//! This module defines the configuration parameters for the agent's policy
//! and value updates and provides validation, builder methods and JSON
//! persistence.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// PPO configuration parameters
///
/// Policy and value networks are trained by separate optimizers, each with
/// its own epoch budget and early-stopping criterion. Defaults follow
/// settings that work for CFD flow-control episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOConfig {
    /// Maximum number of policy gradient steps per update
    pub policy_epochs: usize,

    /// Policy learning rate
    pub policy_lr: f64,

    /// Policy ratio clipping parameter (epsilon)
    pub policy_clip: f64,

    /// Gradient norm cap for the policy (`None` = unbounded)
    pub policy_grad_norm: Option<f64>,

    /// Stop policy training once the approximate KL divergence exceeds this
    pub policy_kl_stop: f64,

    /// Maximum number of value gradient steps per update
    pub value_epochs: usize,

    /// Value learning rate
    pub value_lr: f64,

    /// Value clipping parameter
    pub value_clip: f64,

    /// Gradient norm cap for the value network (`None` = unbounded)
    pub value_grad_norm: Option<f64>,

    /// Stop value training once the MSE to the old values exceeds this
    pub value_mse_stop: f64,

    /// Discount factor (gamma)
    pub gamma: f64,

    /// GAE lambda parameter
    pub lam: f64,

    /// Entropy bonus coefficient
    pub entropy_weight: f64,
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            policy_epochs: 100,
            policy_lr: 1e-3,
            policy_clip: 0.2,
            policy_grad_norm: None,
            policy_kl_stop: 0.2,
            value_epochs: 100,
            value_lr: 1e-3,
            value_clip: 0.2,
            value_grad_norm: None,
            value_mse_stop: 25.0,
            gamma: 0.99,
            lam: 0.97,
            entropy_weight: 0.01,
        }
    }
}

impl PPOConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.policy_epochs == 0 {
            return Err(anyhow!("policy_epochs must be positive"));
        }
        if self.value_epochs == 0 {
            return Err(anyhow!("value_epochs must be positive"));
        }
        if !(self.policy_lr > 0.0) {
            return Err(anyhow!("policy_lr must be positive"));
        }
        if !(self.value_lr > 0.0) {
            return Err(anyhow!("value_lr must be positive"));
        }
        if !(self.policy_clip >= 0.0) {
            return Err(anyhow!("policy_clip must be non-negative"));
        }
        if !(self.value_clip >= 0.0) {
            return Err(anyhow!("value_clip must be non-negative"));
        }
        if let Some(norm) = self.policy_grad_norm
            && !(norm > 0.0)
        {
            return Err(anyhow!("policy_grad_norm must be positive"));
        }
        if let Some(norm) = self.value_grad_norm
            && !(norm > 0.0)
        {
            return Err(anyhow!("value_grad_norm must be positive"));
        }
        if self.policy_kl_stop.is_nan() {
            return Err(anyhow!("policy_kl_stop must not be NaN"));
        }
        if self.value_mse_stop.is_nan() {
            return Err(anyhow!("value_mse_stop must not be NaN"));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(anyhow!("gamma must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.lam) {
            return Err(anyhow!("lam must be in [0, 1]"));
        }
        if !(self.entropy_weight >= 0.0) {
            return Err(anyhow!("entropy_weight must be non-negative"));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Set number of policy epochs
    pub fn policy_epochs(mut self, epochs: usize) -> Self {
        self.policy_epochs = epochs;
        self
    }

    /// Set policy learning rate
    pub fn policy_lr(mut self, lr: f64) -> Self {
        self.policy_lr = lr;
        self
    }

    /// Set policy clipping parameter
    pub fn policy_clip(mut self, clip: f64) -> Self {
        self.policy_clip = clip;
        self
    }

    /// Cap the policy gradient norm
    pub fn policy_grad_norm(mut self, norm: f64) -> Self {
        self.policy_grad_norm = Some(norm);
        self
    }

    /// Set policy KL stopping threshold
    pub fn policy_kl_stop(mut self, kl: f64) -> Self {
        self.policy_kl_stop = kl;
        self
    }

    /// Set number of value epochs
    pub fn value_epochs(mut self, epochs: usize) -> Self {
        self.value_epochs = epochs;
        self
    }

    /// Set value learning rate
    pub fn value_lr(mut self, lr: f64) -> Self {
        self.value_lr = lr;
        self
    }

    /// Set value clipping parameter
    pub fn value_clip(mut self, clip: f64) -> Self {
        self.value_clip = clip;
        self
    }

    /// Cap the value gradient norm
    pub fn value_grad_norm(mut self, norm: f64) -> Self {
        self.value_grad_norm = Some(norm);
        self
    }

    /// Set value MSE stopping threshold
    pub fn value_mse_stop(mut self, mse: f64) -> Self {
        self.value_mse_stop = mse;
        self
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn lam(mut self, lam: f64) -> Self {
        self.lam = lam;
        self
    }

    /// Set entropy bonus coefficient
    pub fn entropy_weight(mut self, weight: f64) -> Self {
        self.entropy_weight = weight;
        self
    }
}
