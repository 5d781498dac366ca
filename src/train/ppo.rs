//! Proximal Policy Optimization (PPO) algorithm
//!
//! This module implements the PPO update used to train a continuous-control
//! agent from whole-episode trajectories. Policy and value networks are
//! optimized separately, each by its own Adam optimizer, each with its own
//! epoch budget and early-stopping criterion.
//!
//! # Algorithm Overview
//!
//! ```text
//! For each iteration:
//!   1. Collect trajectories using the current (traced) policy
//!   2. Snapshot old values and old log-probabilities
//!   3. Compute discounted returns and normalized GAE advantages
//!   4. Up to policy_epochs full-batch steps on the clipped surrogate,
//!      stop once KL(old, new) > policy_kl_stop
//!   5. Up to value_epochs full-batch steps on the clipped value loss,
//!      stop once MSE(old, new) > value_mse_stop
//!   6. Append the per-epoch series to the training history
//! ```
//!
//! # References
//!
//! - [Proximal Policy Optimization Algorithms](https://arxiv.org/abs/1707.06347)
//! - [High-Dimensional Continuous Control Using Generalized Advantage Estimation](https://arxiv.org/abs/1506.02438)

pub mod agent;
pub mod config;
pub mod error;
pub mod history;
pub mod learner;
pub mod loss;
pub mod policy_update;
pub mod stats;
pub mod value_update;

pub use agent::PPOAgent;
pub use config::PPOConfig;
pub use error::{NumericalError, UpdatePhase};
pub use history::{Metric, TrainingHistory};
pub use learner::Learner;
pub use loss::{approx_kl, compute_entropy_loss, compute_policy_loss, compute_value_loss, value_drift};
pub use policy_update::run_policy_update;
pub use stats::{PolicyUpdateStats, UpdateStats, ValueUpdateStats};
pub use value_update::run_value_update;
