//! Per-epoch statistics of one agent update
//!
//! Each engine returns the series it recorded, one entry per applied
//! gradient step. The series length is the number of steps taken, whether
//! the loop ran its full budget or stopped early.

/// Series recorded by the policy update loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyUpdateStats {
    /// Clipped surrogate loss per epoch
    pub policy_loss: Vec<f64>,

    /// Weighted entropy loss per epoch
    pub entropy_loss: Vec<f64>,

    /// Approximate KL divergence after each step
    pub kl: Vec<f64>,

    /// Fraction of clipped ratios per epoch
    pub clip_fraction: Vec<f64>,
}

impl PolicyUpdateStats {
    /// Create empty series with room for `epochs` entries
    pub fn with_capacity(epochs: usize) -> Self {
        Self {
            policy_loss: Vec::with_capacity(epochs),
            entropy_loss: Vec::with_capacity(epochs),
            kl: Vec::with_capacity(epochs),
            clip_fraction: Vec::with_capacity(epochs),
        }
    }

    /// Append one epoch
    pub fn push(&mut self, policy_loss: f64, entropy_loss: f64, kl: f64, clip_fraction: f64) {
        self.policy_loss.push(policy_loss);
        self.entropy_loss.push(entropy_loss);
        self.kl.push(kl);
        self.clip_fraction.push(clip_fraction);
    }

    /// Number of gradient steps applied
    pub fn epochs(&self) -> usize {
        self.policy_loss.len()
    }

    /// KL divergence after the last step
    pub fn final_kl(&self) -> Option<f64> {
        self.kl.last().copied()
    }
}

/// Series recorded by the value update loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueUpdateStats {
    /// Clipped value loss per epoch
    pub value_loss: Vec<f64>,

    /// MSE between old and updated value estimates after each step
    pub mse: Vec<f64>,
}

impl ValueUpdateStats {
    /// Create empty series with room for `epochs` entries
    pub fn with_capacity(epochs: usize) -> Self {
        Self { value_loss: Vec::with_capacity(epochs), mse: Vec::with_capacity(epochs) }
    }

    /// Append one epoch
    pub fn push(&mut self, value_loss: f64, mse: f64) {
        self.value_loss.push(value_loss);
        self.mse.push(mse);
    }

    /// Number of gradient steps applied
    pub fn epochs(&self) -> usize {
        self.value_loss.len()
    }

    /// MSE after the last step
    pub fn final_mse(&self) -> Option<f64> {
        self.mse.last().copied()
    }
}

/// Everything one agent update recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateStats {
    /// Policy loop series
    pub policy: PolicyUpdateStats,

    /// Value loop series
    pub value: ValueUpdateStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_stats_push() {
        let mut stats = PolicyUpdateStats::with_capacity(4);
        assert_eq!(stats.epochs(), 0);
        assert_eq!(stats.final_kl(), None);

        stats.push(0.5, -0.01, 0.001, 0.0);
        stats.push(0.4, -0.01, 0.003, 0.1);

        assert_eq!(stats.epochs(), 2);
        assert_eq!(stats.final_kl(), Some(0.003));
        assert_eq!(stats.entropy_loss, vec![-0.01, -0.01]);
    }

    #[test]
    fn test_value_stats_push() {
        let mut stats = ValueUpdateStats::default();
        stats.push(2.0, 0.1);
        assert_eq!(stats.epochs(), 1);
        assert_eq!(stats.final_mse(), Some(0.1));
    }
}
