//! # Vortex
//!
//! PPO training core for continuous flow control in Rust (via tch-rs)
//!
//! Vortex trains a Beta policy and a state-value network from whole-episode
//! trajectories collected by an external simulation. The training driver
//! owns the simulation loop; this crate owns the update.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vortex_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let policy = MlpPolicy::new(12, 1, &[-5.0], &[5.0])?;
//! let value = MlpValue::new(12)?;
//! let mut agent = PPOAgent::new(policy, value, PPOConfig::default())?;
//!
//! # let (states, actions, rewards): (Vec<tch::Tensor>, Vec<tch::Tensor>, Vec<tch::Tensor>) = (vec![], vec![], vec![]);
//! let stats = agent.update(&states, &actions, &rewards)?;
//! agent.save_iteration("checkpoints", 0)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Trajectories, batches and return/advantage estimation
pub mod buffer;

/// Policy and value network contracts and implementations
pub mod policy;

/// Training algorithms (PPO)
pub mod train;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::buffer::{Batch, BatchError, Trajectory};
    pub use crate::policy::{
        MlpConfig, MlpPolicy, MlpValue, Network, PolicyNetwork, TracedPolicy, ValueNetwork,
    };
    pub use crate::train::ppo::{
        Metric, NumericalError, PPOAgent, PPOConfig, TrainingHistory, UpdateStats,
    };
}

/// Current version of vortex-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
