//! Network + optimizer pair
//!
//! Each of the policy and value networks is trained by its own Adam
//! optimizer. A [`Learner`] owns both halves so the only writer of the
//! parameters is its gradient step.

use anyhow::Result;
use tch::{
    Kind, Tensor,
    nn::{self, OptimizerConfig},
};

use crate::policy::Network;

/// A network together with the optimizer that updates it
pub struct Learner<N> {
    net: N,
    optimizer: nn::Optimizer,
    max_grad_norm: Option<f64>,
    total_steps: usize,
}

impl<N: Network> Learner<N> {
    /// Wrap `net` with an Adam optimizer
    ///
    /// # Arguments
    ///
    /// * `net` - Network to train
    /// * `learning_rate` - Adam learning rate
    /// * `max_grad_norm` - Optional cap on the global gradient norm
    pub fn new(net: N, learning_rate: f64, max_grad_norm: Option<f64>) -> Result<Self> {
        let optimizer = nn::Adam::default().build(net.var_store(), learning_rate)?;
        Ok(Self { net, optimizer, max_grad_norm, total_steps: 0 })
    }

    /// The wrapped network
    pub fn net(&self) -> &N {
        &self.net
    }

    /// Mutable access to the wrapped network (loading parameters)
    pub fn net_mut(&mut self) -> &mut N {
        &mut self.net
    }

    /// Number of optimizer steps applied so far
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Backpropagate `loss` and apply one clipped optimizer step
    ///
    /// Returns `false` without touching the parameters when any gradient is
    /// NaN or infinite.
    pub fn step(&mut self, loss: &Tensor) -> bool {
        // Backward pass
        self.optimizer.zero_grad();
        loss.backward();

        if !self.gradients_finite() {
            self.optimizer.zero_grad();
            return false;
        }

        // Gradient clipping
        if let Some(max_norm) = self.max_grad_norm {
            self.optimizer.clip_grad_norm(max_norm);
        }

        // Optimizer step
        self.optimizer.step();
        self.total_steps += 1;
        true
    }

    fn gradients_finite(&self) -> bool {
        self.net.var_store().trainable_variables().iter().all(|var| {
            let grad = var.grad();
            !grad.defined()
                || f64::try_from(grad.abs().sum(Kind::Double)).is_ok_and(|total| total.is_finite())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{MlpConfig, MlpValue, ValueNetwork};
    use tch::Device;

    #[test]
    fn test_step_reduces_loss() {
        tch::manual_seed(0);
        let value = MlpValue::with_config(2, MlpConfig::new(1, 8), Device::Cpu).unwrap();
        let mut learner = Learner::new(value, 1e-2, Some(1.0)).unwrap();

        let states = Tensor::randn([16, 2], (Kind::Float, Device::Cpu));
        let targets = Tensor::full([16], 3.0, (Kind::Float, Device::Cpu));
        let loss_of = |l: &Learner<MlpValue>| (l.net().evaluate(&states) - &targets).square().mean(Kind::Float);

        let before = f64::try_from(tch::no_grad(|| loss_of(&learner))).unwrap();
        for _ in 0..20 {
            let loss = loss_of(&learner);
            assert!(learner.step(&loss));
        }
        let after = f64::try_from(tch::no_grad(|| loss_of(&learner))).unwrap();

        assert_eq!(learner.total_steps(), 20);
        assert!(after < before, "loss did not decrease: {} -> {}", before, after);
    }

    #[test]
    fn test_non_finite_gradients_skip_step() {
        tch::manual_seed(0);
        let value = MlpValue::with_config(2, MlpConfig::new(1, 8), Device::Cpu).unwrap();
        let mut learner = Learner::new(value, 1e-2, None).unwrap();

        let states = Tensor::randn([4, 2], (Kind::Float, Device::Cpu));
        let before = tch::no_grad(|| learner.net().evaluate(&states));

        // sqrt(|v - v|) is exactly zero, but its derivative at zero is not finite
        let values = learner.net().evaluate(&states);
        let loss = (&values - values.detach()).abs().sqrt().sum(Kind::Float);
        assert_eq!(f64::try_from(&loss).unwrap(), 0.0);

        assert!(!learner.step(&loss));
        assert_eq!(learner.total_steps(), 0);

        let after = tch::no_grad(|| learner.net().evaluate(&states));
        assert_eq!(f64::try_from((&before - &after).abs().max()).unwrap(), 0.0);
    }
}
