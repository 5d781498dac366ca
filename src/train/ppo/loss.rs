//! Loss computation functions for PPO
//!
//! This module contains the clipped policy surrogate, the entropy bonus, the
//! pessimistic clipped value loss, and the two early-stopping statistics.

use tch::{Kind, Tensor};

/// Compute the PPO clipped surrogate policy loss
///
/// ```text
/// ratio = exp(log_p_new - log_p_old)
/// loss  = -mean(min(A * ratio, A * clip(ratio, 1 - ε, 1 + ε)))
/// ```
///
/// Returns (policy_loss, clip_fraction)
///
/// # Arguments
/// * `log_probs` - Log probabilities of actions under the current policy
/// * `old_log_probs` - Log probabilities under the policy that collected the data
/// * `advantages` - Normalized advantages
/// * `clip_range` - Clipping parameter epsilon
pub fn compute_policy_loss(
    log_probs: &Tensor,
    old_log_probs: &Tensor,
    advantages: &Tensor,
    clip_range: f64,
) -> (Tensor, f64) {
    let ratio = (log_probs - old_log_probs).exp();

    let objective = advantages * &ratio;
    let objective_clipped = advantages * ratio.clamp(1.0 - clip_range, 1.0 + clip_range);
    let policy_loss = -objective.minimum(&objective_clipped).mean(Kind::Float);

    // Fraction of samples whose ratio left the trust region (monitoring only)
    let clip_fraction = tch::no_grad(|| {
        (&ratio - 1.0).abs().gt(clip_range).to_kind(Kind::Float).mean(Kind::Float)
    });

    (policy_loss, f64::try_from(&clip_fraction).unwrap_or(0.0))
}

/// Compute the weighted entropy loss
///
/// Negative mean entropy scaled by `entropy_weight`, so adding it to the
/// policy loss rewards higher entropy.
pub fn compute_entropy_loss(entropy: &Tensor, entropy_weight: f64) -> Tensor {
    -entropy.mean(Kind::Float) * entropy_weight
}

/// Compute the clipped value function loss
///
/// ```text
/// V_clipped = V_old + clip(V_new - V_old, -c, c)
/// loss      = 0.5 * mean(max((R - V_new)², (R - V_clipped)²))
/// ```
///
/// # Arguments
/// * `values` - Predictions of the current value network
/// * `old_values` - Predictions captured before the update
/// * `returns` - Discounted returns (targets)
/// * `clip_range_vf` - Value clipping parameter
pub fn compute_value_loss(
    values: &Tensor,
    old_values: &Tensor,
    returns: &Tensor,
    clip_range_vf: f64,
) -> Tensor {
    let values_clipped = old_values + (values - old_values).clamp(-clip_range_vf, clip_range_vf);
    let value_loss_1 = (returns - values).square();
    let value_loss_2 = (returns - values_clipped).square();
    value_loss_1.maximum(&value_loss_2).mean(Kind::Float) * 0.5
}

/// Approximate KL divergence `mean(log_p_old - log_p_new)`
pub fn approx_kl(old_log_probs: &Tensor, log_probs: &Tensor) -> Tensor {
    (old_log_probs - log_probs).mean(Kind::Float)
}

/// Half mean squared deviation of fresh value estimates from the old ones
pub fn value_drift(old_values: &Tensor, values: &Tensor) -> Tensor {
    (old_values - values).square().mean(Kind::Float) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn scalar(t: &Tensor) -> f64 {
        f64::try_from(t).unwrap()
    }

    #[test]
    fn test_policy_loss_no_clipping() {
        // Ratio of exactly one: loss is minus the mean advantage
        let log_probs = Tensor::zeros([4], (Kind::Float, Device::Cpu));
        let old_log_probs = Tensor::zeros([4], (Kind::Float, Device::Cpu));
        let advantages = Tensor::from_slice(&[1.0_f32, -1.0, 2.0, 0.0]);

        let (loss, clip_frac) = compute_policy_loss(&log_probs, &old_log_probs, &advantages, 0.2);

        assert!(loss.size().is_empty()); // Scalar
        assert!((scalar(&loss) - (-0.5)).abs() < 1e-6);
        assert_eq!(clip_frac, 0.0);
    }

    #[test]
    fn test_policy_loss_with_clipping() {
        let log_probs = Tensor::full([4], 1.0, (Kind::Float, Device::Cpu));
        let old_log_probs = Tensor::full([4], -1.0, (Kind::Float, Device::Cpu));
        let advantages = Tensor::ones([4], (Kind::Float, Device::Cpu));

        let (loss, clip_frac) = compute_policy_loss(&log_probs, &old_log_probs, &advantages, 0.2);

        // Positive advantage with ratio e² > 1.2 takes the clipped branch
        assert!((scalar(&loss) - (-1.2)).abs() < 1e-5);
        assert_eq!(clip_frac, 1.0);
    }

    #[test]
    fn test_zero_clip_detaches_clipped_branch() {
        // With ε = 0 the clipped ratio is exactly 1. For positive advantages
        // and ratios above 1 the min picks A * 1, which has no dependence on
        // the new log probabilities.
        let log_probs = Tensor::from_slice(&[0.5_f32, 0.3, 0.1]).set_requires_grad(true);
        let old_log_probs = Tensor::zeros([3], (Kind::Float, Device::Cpu));
        let advantages = Tensor::from_slice(&[1.0_f32, 2.0, 3.0]);

        let (loss, _) = compute_policy_loss(&log_probs, &old_log_probs, &advantages, 0.0);
        assert!((scalar(&loss) - (-2.0)).abs() < 1e-6);

        loss.backward();
        let grad = log_probs.grad();
        assert!(scalar(&grad.abs().max()) < 1e-12, "gradient leaked through clipped branch");
    }

    #[test]
    fn test_zero_clip_keeps_pessimistic_branch() {
        // Ratio below 1 with positive advantage: the unclipped term is smaller
        let log_probs = Tensor::from_slice(&[-0.5_f32]).set_requires_grad(true);
        let old_log_probs = Tensor::zeros([1], (Kind::Float, Device::Cpu));
        let advantages = Tensor::from_slice(&[1.0_f32]);

        let (loss, _) = compute_policy_loss(&log_probs, &old_log_probs, &advantages, 0.0);
        assert!((scalar(&loss) + (-0.5_f64).exp()).abs() < 1e-6);

        loss.backward();
        assert!(scalar(&log_probs.grad().abs().max()) > 0.1);
    }

    #[test]
    fn test_entropy_loss() {
        let entropy = Tensor::full([4], 0.5, (Kind::Float, Device::Cpu));
        let loss = compute_entropy_loss(&entropy, 0.1);
        assert!((scalar(&loss) - (-0.05)).abs() < 1e-7);
    }

    #[test]
    fn test_value_loss_unclipped_region() {
        let values = Tensor::from_slice(&[1.0_f32, 2.0]);
        let old_values = Tensor::from_slice(&[1.0_f32, 2.0]);
        let returns = Tensor::from_slice(&[2.0_f32, 0.0]);

        // 0.5 * mean(1, 4) = 1.25
        let loss = compute_value_loss(&values, &old_values, &returns, 0.2);
        assert!((scalar(&loss) - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_value_loss_is_pessimistic() {
        // New value moved past the target; the clipped estimate stays farther away
        let values = Tensor::from_slice(&[1.5_f32]);
        let old_values = Tensor::from_slice(&[0.5_f32]);
        let returns = Tensor::from_slice(&[1.5_f32]);

        // Unclipped error 0, clipped error (1.5 - 0.7)² = 0.64 → 0.5 * 0.64
        let loss = compute_value_loss(&values, &old_values, &returns, 0.2);
        assert!((scalar(&loss) - 0.32).abs() < 1e-6);
    }

    #[test]
    fn test_stopping_statistics() {
        let old = Tensor::from_slice(&[0.0_f32, 0.0]);
        let new = Tensor::from_slice(&[-0.2_f32, -0.4]);
        assert!((scalar(&approx_kl(&old, &new)) - 0.3).abs() < 1e-6);

        let old_values = Tensor::from_slice(&[1.0_f32, 1.0]);
        let values = Tensor::from_slice(&[2.0_f32, 3.0]);
        // 0.5 * mean(1, 4)
        assert!((scalar(&value_drift(&old_values, &values)) - 1.25).abs() < 1e-6);
    }
}
