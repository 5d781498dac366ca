//! Trajectory storage and return/advantage estimation
//!
//! Rollouts arrive from an external executor as per-trajectory tensors. This
//! module validates them into a [`Batch`] and turns rewards plus value
//! estimates into flat returns and normalized GAE advantages.

pub mod gae;
pub mod trajectory;


pub use gae::{
    ADVANTAGE_EPS, BatchEstimates, compute_gae, compute_returns, estimate_batch,
    normalize_advantages,
};
pub use trajectory::{Batch, BatchError, MIN_TRAJECTORY_LEN, Trajectory};
