//! Clipped surrogate policy update
//!
//! Runs up to `policy_epochs` full-batch gradient steps on the policy and
//! stops as soon as the approximate KL divergence to the data-collecting
//! policy exceeds `policy_kl_stop`. The step that crosses the threshold is
//! kept.

use anyhow::Result;
use tch::Tensor;

use super::{
    config::PPOConfig,
    error::{NumericalError, UpdatePhase},
    learner::Learner,
    loss::{approx_kl, compute_entropy_loss, compute_policy_loss},
    stats::PolicyUpdateStats,
};
use crate::policy::PolicyNetwork;

/// Optimize the policy against fixed advantages
///
/// # Arguments
///
/// * `learner` - Policy network and its optimizer
/// * `states` - Without-finish states `[N, n_states]`
/// * `actions` - Without-finish actions `[N]` or `[N, n_actions]`
/// * `advantages` - Normalized advantages `[N]`
/// * `old_log_probs` - Log probabilities captured before the first step `[N]`
/// * `config` - Epoch budget, clip range, entropy weight and KL threshold
pub fn run_policy_update<P: PolicyNetwork>(
    learner: &mut Learner<P>,
    states: &Tensor,
    actions: &Tensor,
    advantages: &Tensor,
    old_log_probs: &Tensor,
    config: &PPOConfig,
) -> Result<PolicyUpdateStats> {
    let mut stats = PolicyUpdateStats::with_capacity(config.policy_epochs);

    for epoch in 0..config.policy_epochs {
        let (log_probs, entropy) = learner.net().predict(states, actions);

        let (policy_loss, clip_fraction) =
            compute_policy_loss(&log_probs, old_log_probs, advantages, config.policy_clip);
        let entropy_loss = compute_entropy_loss(&entropy, config.entropy_weight);
        let loss = &policy_loss + &entropy_loss;

        let loss_val = f64::try_from(&loss)?;
        if !loss_val.is_finite() {
            return Err(NumericalError::NonFiniteLoss {
                phase: UpdatePhase::Policy,
                epoch,
                value: loss_val,
            }
            .into());
        }
        let policy_loss_val = f64::try_from(&policy_loss)?;
        let entropy_loss_val = f64::try_from(&entropy_loss)?;

        if !learner.step(&loss) {
            return Err(NumericalError::NonFiniteGradient { phase: UpdatePhase::Policy, epoch }.into());
        }

        let kl = tch::no_grad(|| {
            let (log_probs, _) = learner.net().predict(states, actions);
            approx_kl(old_log_probs, &log_probs)
        });
        let kl = f64::try_from(&kl)?;
        if !kl.is_finite() {
            return Err(NumericalError::NonFiniteStatistic {
                phase: UpdatePhase::Policy,
                epoch,
                value: kl,
            }
            .into());
        }

        stats.push(policy_loss_val, entropy_loss_val, kl, clip_fraction);

        tracing::debug!(
            "Policy epoch {}: loss {:.5}, entropy loss {:.5}, KL {:.5}, clip fraction {:.3}",
            epoch,
            policy_loss_val,
            entropy_loss_val,
            kl,
            clip_fraction
        );

        if kl > config.policy_kl_stop {
            tracing::info!(
                "Policy training stopped early after {} epochs (KL {:.4} > {:.4})",
                epoch + 1,
                kl,
                config.policy_kl_stop
            );
            break;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{MlpConfig, MlpPolicy};
    use tch::{Device, Kind};

    struct Fixture {
        learner: Learner<MlpPolicy>,
        states: Tensor,
        actions: Tensor,
        advantages: Tensor,
        old_log_probs: Tensor,
    }

    fn fixture() -> Fixture {
        tch::manual_seed(7);
        let policy = MlpPolicy::with_config(
            3,
            1,
            &[-1.0],
            &[1.0],
            MlpConfig::new(1, 16),
            Device::Cpu,
        )
        .unwrap();
        let learner = Learner::new(policy, 1e-2, None).unwrap();

        let states = Tensor::randn([12, 3], (Kind::Float, Device::Cpu));
        let actions = tch::no_grad(|| learner.net().sample(&states));
        let advantages = Tensor::randn([12], (Kind::Float, Device::Cpu));
        let old_log_probs = tch::no_grad(|| learner.net().predict(&states, &actions).0);

        Fixture { learner, states, actions, advantages, old_log_probs }
    }

    #[test]
    fn test_runs_full_budget_without_stop() {
        let mut f = fixture();
        let config = PPOConfig::new().policy_epochs(4).policy_kl_stop(f64::INFINITY);

        let stats = run_policy_update(
            &mut f.learner,
            &f.states,
            &f.actions,
            &f.advantages,
            &f.old_log_probs,
            &config,
        )
        .unwrap();

        assert_eq!(stats.epochs(), 4);
        assert_eq!(stats.entropy_loss.len(), 4);
        assert_eq!(stats.kl.len(), 4);
        assert_eq!(stats.clip_fraction.len(), 4);
        assert!(stats.clip_fraction.iter().all(|c| (0.0..=1.0).contains(c)));
        assert_eq!(f.learner.total_steps(), 4);
    }

    #[test]
    fn test_kl_stop_keeps_first_step() {
        let mut f = fixture();
        let config = PPOConfig::new().policy_epochs(10).policy_kl_stop(f64::NEG_INFINITY);

        let stats = run_policy_update(
            &mut f.learner,
            &f.states,
            &f.actions,
            &f.advantages,
            &f.old_log_probs,
            &config,
        )
        .unwrap();

        assert_eq!(stats.epochs(), 1);
        assert_eq!(f.learner.total_steps(), 1);
    }

    #[test]
    fn test_non_finite_advantages_rejected() {
        let mut f = fixture();
        let advantages = Tensor::full([12], f64::NAN, (Kind::Float, Device::Cpu));
        let config = PPOConfig::new().policy_epochs(3);

        let err = run_policy_update(
            &mut f.learner,
            &f.states,
            &f.actions,
            &advantages,
            &f.old_log_probs,
            &config,
        )
        .unwrap_err();

        match err.downcast_ref::<NumericalError>() {
            Some(NumericalError::NonFiniteLoss { phase, epoch, .. }) => {
                assert_eq!(*phase, UpdatePhase::Policy);
                assert_eq!(*epoch, 0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(f.learner.total_steps(), 0);
    }

    #[test]
    fn test_diverging_step_rejected() {
        let f = fixture();
        // A step this large leaves non-finite parameters behind
        let policy = MlpPolicy::with_config(3, 1, &[-1.0], &[1.0], MlpConfig::new(1, 16), Device::Cpu).unwrap();
        let mut learner = Learner::new(policy, 1e300, None).unwrap();
        let old_log_probs = tch::no_grad(|| learner.net().predict(&f.states, &f.actions).0);
        let config = PPOConfig::new().policy_epochs(3).policy_kl_stop(f64::INFINITY);

        let err = run_policy_update(&mut learner, &f.states, &f.actions, &f.advantages, &old_log_probs, &config)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<NumericalError>(),
            Some(NumericalError::NonFiniteStatistic { phase: UpdatePhase::Policy, epoch: 0, .. })
        ));
        assert_eq!(learner.total_steps(), 1);
    }
}
