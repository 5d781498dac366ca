//! Training algorithms
//!
//! This module implements the PPO update for the flow-control agent.

pub mod ppo;

pub use ppo::{
    NumericalError, PPOAgent, PPOConfig, PolicyUpdateStats, TrainingHistory, UpdateStats,
    ValueUpdateStats,
};
