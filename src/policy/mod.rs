//! Policy and value network contracts
//!
//! The training core only sees networks through the traits in this module:
//! a differentiable policy that scores (state, action) pairs and a
//! differentiable value function over states. Concrete architectures live in
//! submodules and can be swapped without touching the update engines.

use tch::{Device, Tensor, nn};

pub mod distribution;
pub mod mlp;
pub mod traced;

pub use distribution::Beta;
pub use mlp::{Activation, MlpConfig, MlpPolicy, MlpValue};
pub use traced::TracedPolicy;

/// A network whose parameters live in a `tch` variable store
pub trait Network {
    /// Variable store holding the trainable parameters
    fn var_store(&self) -> &nn::VarStore;

    /// Mutable variable store (optimizer creation, loading)
    fn var_store_mut(&mut self) -> &mut nn::VarStore;

    /// Device the parameters live on
    fn device(&self) -> Device {
        self.var_store().device()
    }
}

/// Stochastic policy over continuous actions
pub trait PolicyNetwork: Network {
    /// Log probability and entropy of `actions` taken in `states`
    ///
    /// Both outputs have one entry per row of `states`. The result is
    /// differentiable with respect to the policy parameters.
    fn predict(&self, states: &Tensor, actions: &Tensor) -> (Tensor, Tensor);

    /// Sample actions for a batch of states
    fn sample(&self, states: &Tensor) -> Tensor;

    /// Raw network output (distribution parameters); this is what gets traced
    fn forward(&self, states: &Tensor) -> Tensor;

    /// Width of one state vector
    fn n_states(&self) -> i64;

    /// Number of action dimensions (`[N]` actions count as one)
    fn n_actions(&self) -> i64;
}

/// State-value function
pub trait ValueNetwork: Network {
    /// Value estimate per state, shape `[N]`
    fn evaluate(&self, states: &Tensor) -> Tensor;
}
