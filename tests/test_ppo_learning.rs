//! Unit test to verify PPO can learn from synthetic data
//!
//! This test creates a simple batch where the preferred action is obvious:
//! - When obs=0, action=-0.8 has a high advantage
//! - When obs=1, action=+0.8 has a high advantage
//!
//! If the policy update is working correctly, the log probability of the
//! preferred actions must increase over a few updates.

use tch::{Device, Kind, Tensor};
use vortex_rl::{
    policy::{MlpConfig, MlpPolicy, PolicyNetwork},
    train::ppo::{Learner, PPOConfig, run_policy_update},
};

fn mean_log_prob(policy: &MlpPolicy, observations: &Tensor, actions: &Tensor) -> f64 {
    let log_probs = tch::no_grad(|| policy.predict(observations, actions).0);
    f64::try_from(log_probs.mean(Kind::Float)).unwrap()
}

#[test]
fn test_ppo_learns_from_synthetic_data() {
    tch::manual_seed(42);

    let policy =
        MlpPolicy::with_config(1, 1, &[-1.0], &[1.0], MlpConfig::new(2, 64), Device::Cpu).unwrap();
    let mut learner = Learner::new(policy, 0.01, Some(0.5)).unwrap();

    // 8 samples: 4 with obs=0 (prefer -0.8), 4 with obs=1 (prefer +0.8)
    let observations = Tensor::from_slice(&[0.0_f32, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]).view([8, 1]);
    let actions = Tensor::from_slice(&[-0.8_f32, -0.8, -0.8, -0.8, 0.8, 0.8, 0.8, 0.8]).view([8, 1]);
    let advantages = Tensor::full([8], 10.0, (Kind::Float, Device::Cpu));

    let before = mean_log_prob(learner.net(), &observations, &actions);

    let config = PPOConfig::new()
        .policy_epochs(10)
        .policy_clip(0.2)
        .policy_kl_stop(f64::INFINITY)
        .entropy_weight(0.0); // Focus purely on the advantage

    for i in 0..5 {
        // Fresh snapshot per update, as the agent does
        let old_log_probs = tch::no_grad(|| learner.net().predict(&observations, &actions).0);

        let stats =
            run_policy_update(&mut learner, &observations, &actions, &advantages, &old_log_probs, &config)
                .unwrap_or_else(|e| panic!("PPO update {} failed: {}", i, e));

        assert_eq!(stats.epochs(), 10);
        assert!(stats.policy_loss.iter().all(|l| l.is_finite()));
    }

    let after = mean_log_prob(learner.net(), &observations, &actions);

    assert!(
        after - before > 0.1,
        "PPO failed to learn: mean log p only moved from {:.4} to {:.4}",
        before,
        after
    );
}
