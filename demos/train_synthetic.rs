//! Train the PPO agent on a synthetic actuation task
//!
//! A stand-in for the CFD loop: the state is a noisy scalar "lift" signal
//! plus its previous value, the action is an actuator setting in [-1, 1],
//! and the reward penalizes the distance of the signal from zero. Each
//! iteration collects a handful of episodes with the current policy,
//! updates the agent and writes the per-iteration artifacts.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_synthetic --release
//! ```

use anyhow::Result;
use rand::Rng;
use tch::{Device, Tensor};
use vortex_rl::prelude::*;

const N_STATES: i64 = 2;
const EPISODE_LEN: usize = 40;
const EPISODES_PER_ITERATION: usize = 8;
const ITERATIONS: usize = 20;

/// Roll out one episode with the current policy
fn collect_episode(policy: &MlpPolicy, rng: &mut impl Rng) -> Result<(Tensor, Tensor, Tensor)> {
    let mut lift: f32 = rng.gen_range(-1.0..1.0);
    let mut prev = lift;

    let mut states = Vec::with_capacity(EPISODE_LEN * N_STATES as usize);
    let mut actions = Vec::with_capacity(EPISODE_LEN);
    let mut rewards = Vec::with_capacity(EPISODE_LEN);

    for _ in 0..EPISODE_LEN {
        let state = [lift, prev];
        let action = policy.sample(&Tensor::from_slice(&state).view([1, N_STATES]));
        let action = action.to_device(Device::Cpu).view([-1]).get(0);
        let action = f32::try_from(&action)?;

        states.extend_from_slice(&state);
        actions.push(action);

        prev = lift;
        lift = 0.9 * lift - 0.3 * action + rng.gen_range(-0.05..0.05);
        rewards.push(-lift * lift);
    }

    Ok((
        Tensor::from_slice(&states).view([EPISODE_LEN as i64, N_STATES]),
        Tensor::from_slice(&actions),
        Tensor::from_slice(&rewards),
    ))
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    tracing::info!("Synthetic flow-control PPO training");

    let config = PPOConfig::new().policy_epochs(20).value_epochs(20).gamma(0.95);
    let output_dir = std::env::temp_dir().join("vortex_train_synthetic");
    config.save_json(std::env::temp_dir().join("vortex_ppo_config.json"))?;

    let policy = MlpPolicy::with_config(N_STATES, 1, &[-1.0], &[1.0], MlpConfig::new(2, 64), Device::Cpu)?;
    let value = MlpValue::with_config(N_STATES, MlpConfig::new(2, 64), Device::Cpu)?;
    let mut agent = PPOAgent::new(policy, value, config)?;

    let mut rng = rand::thread_rng();

    for iteration in 0..ITERATIONS {
        let mut states = Vec::with_capacity(EPISODES_PER_ITERATION);
        let mut actions = Vec::with_capacity(EPISODES_PER_ITERATION);
        let mut rewards = Vec::with_capacity(EPISODES_PER_ITERATION);
        let mut total_reward = 0.0;

        for _ in 0..EPISODES_PER_ITERATION {
            let (s, a, r) = collect_episode(agent.policy(), &mut rng)?;
            total_reward += f64::try_from(r.sum(tch::Kind::Float))?;
            states.push(s);
            actions.push(a);
            rewards.push(r);
        }

        let stats = agent.update(&states, &actions, &rewards)?;
        agent.save_iteration(&output_dir, iteration)?;

        tracing::info!(
            "Iteration {:>3} | mean return {:>8.3} | policy epochs {:>3} | value epochs {:>3}",
            iteration,
            total_reward / EPISODES_PER_ITERATION as f64,
            stats.policy.epochs(),
            stats.value.epochs()
        );
    }

    tracing::info!("Artifacts written to {}", output_dir.display());
    Ok(())
}
