//! Return and Generalized Advantage Estimation (GAE) computation
//!
//! This module turns per-trajectory rewards and value estimates into the
//! discounted returns used as value targets and the normalized advantages
//! used by the clipped policy objective.

use super::trajectory::Batch;

/// Numerical floor added to the advantage standard deviation
pub const ADVANTAGE_EPS: f32 = f32::EPSILON;

/// Compute discounted returns-to-go for one trajectory
///
/// ```text
/// G_t = r_t + γ * G_{t+1},   G_last = r_last
/// ```
///
/// The output has the same length as `rewards`.
pub fn compute_returns(rewards: &[f32], gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = 0.0;

    for t in (0..rewards.len()).rev() {
        running = rewards[t] + gamma * running;
        returns[t] = running;
    }

    returns
}

/// Compute Generalized Advantage Estimation (GAE) for one trajectory
///
/// # Arguments
/// * `rewards` - Rewards r_0..r_{n-1}
/// * `values` - Value estimates, either `n` long (the value beyond the
///   trajectory end is taken as zero) or `n + 1` long (the last entry is the
///   bootstrap value V_n)
/// * `gamma` - Discount factor
/// * `lam` - GAE lambda parameter
///
/// # Panics
///
/// Panics if `values` has any other length.
///
/// # Mathematical Formula
/// ```text
/// δ_t = r_t + γ * V_{t+1} - V_t
/// A_t = δ_t + γ * λ * A_{t+1}
/// ```
pub fn compute_gae(rewards: &[f32], values: &[f32], gamma: f32, lam: f32) -> Vec<f32> {
    let num_steps = rewards.len();
    assert!(
        values.len() == num_steps || values.len() == num_steps + 1,
        "values must have {} or {} entries, got {}",
        num_steps,
        num_steps + 1,
        values.len()
    );

    let mut advantages = vec![0.0; num_steps];
    let mut gae = 0.0;

    for t in (0..num_steps).rev() {
        let next_value = values.get(t + 1).copied().unwrap_or(0.0);
        let delta = rewards[t] + gamma * next_value - values[t];
        gae = delta + gamma * lam * gae;
        advantages[t] = gae;
    }

    advantages
}

/// Normalize advantages to zero mean and unit standard deviation in place
///
/// Uses the unbiased sample standard deviation plus [`ADVANTAGE_EPS`], so a
/// constant batch maps to all zeros instead of dividing by zero. With fewer
/// than two entries the standard deviation is taken as zero.
pub fn normalize_advantages(advantages: &mut [f32]) {
    let n = advantages.len();
    if n == 0 {
        return;
    }

    let mean = advantages.iter().map(|&a| a as f64).sum::<f64>() / n as f64;
    let std = if n > 1 {
        let var = advantages.iter().map(|&a| (a as f64 - mean).powi(2)).sum::<f64>()
            / (n - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    if std < ADVANTAGE_EPS as f64 {
        tracing::warn!("Advantage batch has (near) zero variance; normalized advantages collapse to zero");
    }

    let denom = std + ADVANTAGE_EPS as f64;
    for a in advantages.iter_mut() {
        *a = ((*a as f64 - mean) / denom) as f32;
    }
}

/// Flat returns and normalized advantages for a whole batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEstimates {
    /// Returns for every step of every trajectory, in trajectory order
    pub returns: Vec<f32>,

    /// Normalized advantages for every step except the last of each trajectory
    pub advantages: Vec<f32>,
}

/// Compute returns and normalized advantages across a batch
///
/// `values[i]` holds the value estimate of every state of trajectory `i`.
/// Advantages use the first `L - 1` rewards and bootstrap from the final
/// state's value, so they line up with the states that have a following
/// reward.
pub fn estimate_batch(batch: &Batch, values: &[Vec<f32>], gamma: f32, lam: f32) -> BatchEstimates {
    debug_assert_eq!(batch.len(), values.len(), "one value sequence per trajectory");

    let mut returns = Vec::with_capacity(batch.total_steps());
    let mut advantages = Vec::with_capacity(batch.total_transitions());

    for (trajectory, traj_values) in batch.iter().zip(values) {
        let rewards = trajectory.rewards();
        returns.extend(compute_returns(rewards, gamma));
        advantages.extend(compute_gae(&rewards[..rewards.len() - 1], traj_values, gamma, lam));
    }

    normalize_advantages(&mut advantages);

    BatchEstimates { returns, advantages }
}
