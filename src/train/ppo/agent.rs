//! PPO agent facade
//!
//! [`PPOAgent`] owns the policy and value networks, their optimizers, the
//! configuration and the training history. One call to [`PPOAgent::update`]
//! turns a batch of trajectories into one round of policy and value
//! optimization:
//!
//! ```text
//! batch ─▶ old values / old log-probs (no grad, once)
//!       ─▶ returns + normalized GAE
//!       ─▶ policy epochs (KL early stop)
//!       ─▶ value epochs  (MSE early stop)
//!       ─▶ history
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use tch::{Device, Kind, Tensor};

use super::{
    config::PPOConfig,
    history::TrainingHistory,
    learner::Learner,
    policy_update::run_policy_update,
    stats::UpdateStats,
    value_update::run_value_update,
};
use crate::{
    buffer::{Batch, BatchError, estimate_batch},
    policy::{PolicyNetwork, TracedPolicy, ValueNetwork},
};

/// PPO agent with separately optimized policy and value networks
pub struct PPOAgent<P, V> {
    policy: Learner<P>,
    value: Learner<V>,
    config: PPOConfig,
    history: TrainingHistory,
}

impl<P: PolicyNetwork, V: ValueNetwork> PPOAgent<P, V> {
    /// Create an agent
    ///
    /// Validates `config` and builds one Adam optimizer per network.
    pub fn new(policy: P, value: V, config: PPOConfig) -> Result<Self> {
        config.validate()?;

        let policy = Learner::new(policy, config.policy_lr, config.policy_grad_norm)?;
        let value = Learner::new(value, config.value_lr, config.value_grad_norm)?;

        Ok(Self { policy, value, config, history: TrainingHistory::new() })
    }

    /// Run one update on per-trajectory tensors
    ///
    /// The three slices hold one tensor per trajectory: states `[L, n_states]`,
    /// actions `[L]` or `[L, n_actions]` and rewards `[L]`. Malformed input is
    /// rejected with a [`BatchError`] before any network is touched.
    pub fn update(&mut self, states: &[Tensor], actions: &[Tensor], rewards: &[Tensor]) -> Result<UpdateStats> {
        let batch = Batch::new(states, actions, rewards)?;
        self.update_batch(&batch)
    }

    /// Run one update on an already validated batch
    ///
    /// A [`crate::train::ppo::NumericalError`] aborts the call; gradient steps
    /// applied before it are kept and nothing is added to the history.
    pub fn update_batch(&mut self, batch: &Batch) -> Result<UpdateStats> {
        let n_states = self.policy.net().n_states();
        if batch.state_dim() != n_states {
            return Err(BatchError::InconsistentWidth {
                index: 0,
                tensor: "states",
                expected: vec![n_states],
                found: vec![batch.state_dim()],
            }
            .into());
        }

        let n_actions = self.policy.net().n_actions();
        if batch.action_dim() != n_actions {
            return Err(BatchError::InconsistentWidth {
                index: 0,
                tensor: "actions",
                expected: vec![n_actions],
                found: vec![batch.action_dim()],
            }
            .into());
        }

        let policy_device = self.policy.net().device();
        let value_device = self.value.net().device();

        // Snapshots taken once, before any gradient step
        let states = batch.states(value_device);
        let old_values = tch::no_grad(|| self.value.net().evaluate(&states)).detach();

        let states_wf = batch.states_without_finish(policy_device);
        let actions_wf = batch.actions_without_finish(policy_device);
        let old_log_probs = tch::no_grad(|| self.policy.net().predict(&states_wf, &actions_wf).0).detach();

        let values = split_per_trajectory(&old_values, batch)?;
        let estimates = estimate_batch(batch, &values, self.config.gamma as f32, self.config.lam as f32);

        let advantages = Tensor::from_slice(&estimates.advantages).to_device(policy_device);
        let returns = Tensor::from_slice(&estimates.returns).to_device(value_device);

        let policy_stats = run_policy_update(
            &mut self.policy,
            &states_wf,
            &actions_wf,
            &advantages,
            &old_log_probs,
            &self.config,
        )?;
        let value_stats = run_value_update(&mut self.value, &states, &returns, &old_values, &self.config)?;

        let stats = UpdateStats { policy: policy_stats, value: value_stats };
        self.history.record(&stats);

        tracing::info!(
            "Update {}: {} trajectories, {} policy epochs (KL {:.4}, clip fraction {:.3}), {} value epochs (MSE {:.4})",
            self.history.num_updates(),
            batch.len(),
            stats.policy.epochs(),
            stats.policy.final_kl().unwrap_or(0.0),
            stats.policy.clip_fraction.last().copied().unwrap_or(0.0),
            stats.value.epochs(),
            stats.value.final_mse().unwrap_or(0.0)
        );

        Ok(stats)
    }

    /// Save both parameter sets
    pub fn save<A: AsRef<Path>, B: AsRef<Path>>(&self, policy_path: A, value_path: B) -> Result<()> {
        let (policy_path, value_path) = (policy_path.as_ref(), value_path.as_ref());
        self.policy
            .net()
            .var_store()
            .save(policy_path)
            .with_context(|| format!("failed to save policy to {}", policy_path.display()))?;
        self.value
            .net()
            .var_store()
            .save(value_path)
            .with_context(|| format!("failed to save value network to {}", value_path.display()))?;
        Ok(())
    }

    /// Load both parameter sets written by [`PPOAgent::save`]
    ///
    /// Optimizer moments are not persisted; training resumes with the
    /// restored parameters and the existing optimizer state.
    pub fn load<A: AsRef<Path>, B: AsRef<Path>>(&mut self, policy_path: A, value_path: B) -> Result<()> {
        let (policy_path, value_path) = (policy_path.as_ref(), value_path.as_ref());
        self.policy
            .net_mut()
            .var_store_mut()
            .load(policy_path)
            .with_context(|| format!("failed to load policy from {}", policy_path.display()))?;
        self.value
            .net_mut()
            .var_store_mut()
            .load(value_path)
            .with_context(|| format!("failed to load value network from {}", value_path.display()))?;
        Ok(())
    }

    /// Trace the policy forward pass into an inference-only module
    pub fn trace_policy(&self) -> Result<TracedPolicy> {
        TracedPolicy::trace(self.policy.net())
    }

    /// Write the per-iteration artifact set into `dir`
    ///
    /// Produces `policy_{i}.ot`, `value_{i}.ot`, `policy_trace_{i}.pt` and
    /// `training_history_{i}.json`.
    pub fn save_iteration<D: AsRef<Path>>(&self, dir: D, iteration: usize) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        self.save(
            dir.join(format!("policy_{}.ot", iteration)),
            dir.join(format!("value_{}.ot", iteration)),
        )?;
        self.trace_policy()?.save(dir.join(format!("policy_trace_{}.pt", iteration)))?;
        self.history.save_json(dir.join(format!("training_history_{}.json", iteration)))?;

        tracing::debug!("Saved iteration {} artifacts to {}", iteration, dir.display());
        Ok(())
    }

    /// Training history across updates
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Configuration
    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    /// Policy network
    pub fn policy(&self) -> &P {
        self.policy.net()
    }

    /// Value network
    pub fn value(&self) -> &V {
        self.value.net()
    }
}

/// Split flat per-step values back into one sequence per trajectory
fn split_per_trajectory(values: &Tensor, batch: &Batch) -> Result<Vec<Vec<f32>>> {
    let flat = values.to_device(Device::Cpu).to_kind(Kind::Float).contiguous();
    let flat = Vec::<f32>::try_from(&flat)?;

    let mut offset = 0;
    let mut per_trajectory = Vec::with_capacity(batch.len());
    for trajectory in batch {
        let len = trajectory.len();
        per_trajectory.push(flat[offset..offset + len].to_vec());
        offset += len;
    }
    Ok(per_trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{MlpConfig, MlpPolicy, MlpValue};
    use crate::train::ppo::history::Metric;

    fn agent(config: PPOConfig) -> PPOAgent<MlpPolicy, MlpValue> {
        tch::manual_seed(3);
        let policy =
            MlpPolicy::with_config(2, 1, &[-1.0], &[1.0], MlpConfig::new(1, 16), Device::Cpu).unwrap();
        let value = MlpValue::with_config(2, MlpConfig::new(1, 16), Device::Cpu).unwrap();
        PPOAgent::new(policy, value, config).unwrap()
    }

    fn batch(n: usize, len: i64) -> (Vec<Tensor>, Vec<Tensor>, Vec<Tensor>) {
        let states = (0..n).map(|_| Tensor::randn([len, 2], (Kind::Float, Device::Cpu))).collect();
        let actions = (0..n).map(|_| Tensor::rand([len, 1], (Kind::Float, Device::Cpu)) * 2.0 - 1.0).collect();
        let rewards = (0..n).map(|_| Tensor::ones([len], (Kind::Float, Device::Cpu))).collect();
        (states, actions, rewards)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let policy =
            MlpPolicy::with_config(2, 1, &[-1.0], &[1.0], MlpConfig::new(1, 8), Device::Cpu).unwrap();
        let value = MlpValue::with_config(2, MlpConfig::new(1, 8), Device::Cpu).unwrap();
        assert!(PPOAgent::new(policy, value, PPOConfig::new().gamma(2.0)).is_err());
    }

    #[test]
    fn test_update_records_history() {
        let mut agent = agent(PPOConfig::new().policy_epochs(3).value_epochs(4).value_mse_stop(1e9));
        let (states, actions, rewards) = batch(2, 4);

        let stats = agent.update(&states, &actions, &rewards).unwrap();

        assert!(stats.policy.epochs() >= 1 && stats.policy.epochs() <= 3);
        assert_eq!(stats.value.epochs(), 4);
        assert_eq!(agent.history().num_updates(), 1);
        assert_eq!(agent.history().latest(Metric::ValueLoss).map(<[f64]>::len), Some(4));
    }

    #[test]
    fn test_state_width_mismatch_rejected() {
        let mut agent = agent(PPOConfig::new().policy_epochs(1).value_epochs(1));
        let states = vec![Tensor::randn([3, 5], (Kind::Float, Device::Cpu))];
        let actions = vec![Tensor::zeros([3, 1], (Kind::Float, Device::Cpu))];
        let rewards = vec![Tensor::ones([3], (Kind::Float, Device::Cpu))];

        let err = agent.update(&states, &actions, &rewards).unwrap_err();
        assert!(matches!(err.downcast_ref::<BatchError>(), Some(BatchError::InconsistentWidth { .. })));
        assert!(agent.history().is_empty());
    }

    #[test]
    fn test_action_width_mismatch_rejected() {
        let mut agent = agent(PPOConfig::new().policy_epochs(1).value_epochs(1));
        let inputs = Tensor::randn([4, 2], (Kind::Float, Device::Cpu));
        let before = tch::no_grad(|| agent.policy().forward(&inputs));

        // Two action columns for a single-action policy
        let states = vec![Tensor::randn([4, 2], (Kind::Float, Device::Cpu))];
        let actions = vec![Tensor::zeros([4, 2], (Kind::Float, Device::Cpu))];
        let rewards = vec![Tensor::ones([4], (Kind::Float, Device::Cpu))];

        let err = agent.update(&states, &actions, &rewards).unwrap_err();
        match err.downcast_ref::<BatchError>() {
            Some(BatchError::InconsistentWidth { tensor, expected, found, .. }) => {
                assert_eq!(*tensor, "actions");
                assert_eq!(expected, &vec![1]);
                assert_eq!(found, &vec![2]);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let after = tch::no_grad(|| agent.policy().forward(&inputs));
        assert_eq!(f64::try_from((&before - &after).abs().max()).unwrap(), 0.0);
        assert!(agent.history().is_empty());
    }

    #[test]
    fn test_flat_actions_accepted_for_single_action_policy() {
        let mut agent = agent(PPOConfig::new().policy_epochs(1).value_epochs(1));
        let states = vec![Tensor::randn([4, 2], (Kind::Float, Device::Cpu))];
        let actions = vec![Tensor::zeros([4], (Kind::Float, Device::Cpu))];
        let rewards = vec![Tensor::ones([4], (Kind::Float, Device::Cpu))];

        assert!(agent.update(&states, &actions, &rewards).is_ok());
    }

    #[test]
    fn test_split_per_trajectory() {
        let (states, actions, rewards) = batch(2, 3);
        let batch = Batch::new(&states, &actions, &rewards).unwrap();
        let values = Tensor::from_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let split = split_per_trajectory(&values, &batch).unwrap();
        assert_eq!(split, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }
}
