//! Fully connected policy and value networks
//!
//! # Architecture
//!
//! ```text
//! Input (states)
//!         |
//!   [Dense(n_neurons)] x n_layers
//!         |
//!     ReLU / Tanh
//!       /      \
//!  MlpPolicy   MlpValue
//!     |            |
//! [Dense(2n)]   [Dense(1)]
//!     |            |
//! 1 + softplus   Value
//!     |
//! Beta(α, β) per action
//! ```
//!
//! Policy actions are Beta distributed on `[0, 1]` and mapped linearly onto
//! `[action_min, action_max]`.

use anyhow::{Result, bail};
use tch::{
    Device, Kind, Tensor,
    nn::{self, Module},
};

use super::{Beta, Network, PolicyNetwork, ValueNetwork};

/// Configuration for MLP architecture
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Number of hidden layers
    pub n_layers: usize,
    /// Neurons per hidden layer
    pub n_neurons: i64,
    /// Hidden activation
    pub activation: Activation,
}

/// Hidden layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Rectified linear unit
    ReLU,
    /// Hyperbolic tangent
    Tanh,
}

impl Activation {
    fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::ReLU => x.relu(),
            Activation::Tanh => x.tanh(),
        }
    }
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self { n_layers: 2, n_neurons: 512, activation: Activation::ReLU }
    }
}

impl MlpConfig {
    /// Create a configuration with the given hidden layout
    pub fn new(n_layers: usize, n_neurons: i64) -> Self {
        Self { n_layers, n_neurons, ..Default::default() }
    }

    /// Set hidden activation
    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_layers == 0 {
            bail!("n_layers must be positive");
        }
        if self.n_neurons <= 0 {
            bail!("n_neurons must be positive");
        }
        Ok(())
    }
}

/// Hidden stack shared by the policy and the value network
fn hidden_stack(path: nn::Path<'_>, n_inputs: i64, config: &MlpConfig) -> nn::Sequential {
    let mut stack = nn::seq();
    let activation = config.activation;
    let mut n_in = n_inputs;

    for i in 0..config.n_layers {
        stack = stack
            .add(nn::linear(&path / format!("fc{}", i + 1), n_in, config.n_neurons, Default::default()))
            .add_fn(move |x| activation.apply(x));
        n_in = config.n_neurons;
    }

    stack
}

/// Feed-forward Beta policy for bounded continuous actions
pub struct MlpPolicy {
    vs: nn::VarStore,
    hidden: nn::Sequential,
    last: nn::Linear,
    n_states: i64,
    n_actions: i64,
    action_min: Tensor,
    action_range: Tensor,
    config: MlpConfig,
}

impl MlpPolicy {
    /// Create a policy with the default architecture
    ///
    /// Uses CUDA when available.
    pub fn new(n_states: i64, n_actions: i64, action_min: &[f32], action_max: &[f32]) -> Result<Self> {
        let device = Device::cuda_if_available();
        tracing::info!("MlpPolicy using device: {:?}", device);
        Self::with_config(n_states, n_actions, action_min, action_max, MlpConfig::default(), device)
    }

    /// Create a policy with a custom architecture on a given device
    ///
    /// # Arguments
    ///
    /// * `n_states` - State dimensionality
    /// * `n_actions` - Action dimensionality
    /// * `action_min` - Lower actuator bound per action
    /// * `action_max` - Upper actuator bound per action (strictly above `action_min`)
    /// * `config` - Hidden layout
    /// * `device` - Device for parameters
    pub fn with_config(
        n_states: i64,
        n_actions: i64,
        action_min: &[f32],
        action_max: &[f32],
        config: MlpConfig,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;
        if n_states <= 0 || n_actions <= 0 {
            bail!("n_states and n_actions must be positive");
        }
        if action_min.len() != n_actions as usize || action_max.len() != n_actions as usize {
            bail!(
                "expected {} action bounds, got {} lower and {} upper",
                n_actions,
                action_min.len(),
                action_max.len()
            );
        }
        if action_min.iter().zip(action_max).any(|(lo, hi)| lo >= hi) {
            bail!("every action_max must exceed its action_min");
        }

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let hidden = hidden_stack(&root / "layers", n_states, &config);
        let last = nn::linear(&root / "last", config.n_neurons, 2 * n_actions, Default::default());

        let action_min_t = Tensor::from_slice(action_min).to_device(device);
        let action_range = (Tensor::from_slice(action_max) - Tensor::from_slice(action_min)).to_device(device);

        Ok(Self {
            vs,
            hidden,
            last,
            n_states,
            n_actions,
            action_min: action_min_t,
            action_range,
            config,
        })
    }

    /// Architecture configuration
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Beta distribution over scaled actions for the given states
    pub fn distribution(&self, states: &Tensor) -> Beta {
        let out = self.forward(states);
        let alpha = out.narrow(1, 0, self.n_actions);
        let beta = out.narrow(1, self.n_actions, self.n_actions);
        Beta::new(alpha, beta)
    }

    fn scale(&self, actions: &Tensor) -> Tensor {
        (actions - &self.action_min) / &self.action_range
    }

    fn unscale(&self, scaled: &Tensor) -> Tensor {
        scaled * &self.action_range + &self.action_min
    }
}

impl Network for MlpPolicy {
    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

impl PolicyNetwork for MlpPolicy {
    fn predict(&self, states: &Tensor, actions: &Tensor) -> (Tensor, Tensor) {
        let dist = self.distribution(states);
        let actions = if actions.dim() == 1 { actions.unsqueeze(-1) } else { actions.shallow_clone() };

        let log_p = dist.log_prob(&self.scale(&actions)).sum_dim_intlist(-1, false, Kind::Float);
        let entropy = dist.entropy().sum_dim_intlist(-1, false, Kind::Float);
        (log_p, entropy)
    }

    fn sample(&self, states: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let dist = self.distribution(states);
            self.unscale(&dist.sample())
        })
    }

    fn forward(&self, states: &Tensor) -> Tensor {
        let features = self.hidden.forward(states);
        self.last.forward(&features).softplus() + 1.0
    }

    fn n_states(&self) -> i64 {
        self.n_states
    }

    fn n_actions(&self) -> i64 {
        self.n_actions
    }
}

/// Feed-forward state-value network
pub struct MlpValue {
    vs: nn::VarStore,
    hidden: nn::Sequential,
    last: nn::Linear,
    config: MlpConfig,
}

impl MlpValue {
    /// Create a value network with the default architecture
    pub fn new(n_states: i64) -> Result<Self> {
        let device = Device::cuda_if_available();
        tracing::info!("MlpValue using device: {:?}", device);
        Self::with_config(n_states, MlpConfig::default(), device)
    }

    /// Create a value network with a custom architecture on a given device
    pub fn with_config(n_states: i64, config: MlpConfig, device: Device) -> Result<Self> {
        config.validate()?;
        if n_states <= 0 {
            bail!("n_states must be positive");
        }

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let hidden = hidden_stack(&root / "layers", n_states, &config);
        let last = nn::linear(&root / "last", config.n_neurons, 1, Default::default());

        Ok(Self { vs, hidden, last, config })
    }

    /// Architecture configuration
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }
}

impl Network for MlpValue {
    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

impl ValueNetwork for MlpValue {
    fn evaluate(&self, states: &Tensor) -> Tensor {
        let features = self.hidden.forward(states);
        self.last.forward(&features).squeeze_dim(-1)
    }
}
