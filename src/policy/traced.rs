//! Inference-only TorchScript export of a policy
//!
//! After every training iteration the rollout executor needs the current
//! policy without any of the training machinery. Tracing the policy's
//! forward pass yields a self-contained TorchScript module: it holds the
//! parameter values but no gradients, optimizer state or Rust types, and can
//! be loaded from libtorch in any language.

use std::path::Path;

use anyhow::{Context, Result};
use tch::{CModule, Kind, Tensor};

use super::PolicyNetwork;

/// Traced policy forward pass (states → distribution parameters)
pub struct TracedPolicy {
    module: CModule,
}

impl TracedPolicy {
    /// Trace `policy.forward` on a dummy single-state batch
    pub fn trace<P: PolicyNetwork + ?Sized>(policy: &P) -> Result<Self> {
        let example = Tensor::zeros([1, policy.n_states()], (Kind::Float, policy.device()));

        let module = tch::no_grad(|| {
            CModule::create_by_tracing("policy", "forward", &[example], &mut |inputs: &[Tensor]| {
                vec![policy.forward(&inputs[0])]
            })
        })
        .context("failed to trace policy forward pass")?;

        Ok(Self { module })
    }

    /// Run the traced forward pass
    pub fn forward(&self, states: &Tensor) -> Result<Tensor> {
        Ok(self.module.forward_ts(&[states])?)
    }

    /// Write the TorchScript archive to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.module
            .save(path)
            .with_context(|| format!("failed to save traced policy to {}", path.display()))
    }

    /// Load a TorchScript archive written by [`TracedPolicy::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let module = CModule::load(path)
            .with_context(|| format!("failed to load traced policy from {}", path.display()))?;
        Ok(Self { module })
    }
}
