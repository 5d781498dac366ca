//! Beta action distribution for bounded continuous actions
//!
//! The policy network outputs two concentration parameters per action
//! dimension. Actions are modelled on `[0, 1]` and mapped linearly onto the
//! actuator bounds by the policy.

use tch::Tensor;

/// Distance kept from the support edges when evaluating log densities
pub const SUPPORT_EPS: f64 = f32::EPSILON as f64;

/// Element-wise Beta distribution
#[derive(Debug)]
pub struct Beta {
    alpha: Tensor,
    beta: Tensor,
}

impl Beta {
    /// Create from concentration tensors of identical shape (both > 0)
    pub fn new(alpha: Tensor, beta: Tensor) -> Self {
        Self { alpha, beta }
    }

    /// First concentration parameter
    pub fn alpha(&self) -> &Tensor {
        &self.alpha
    }

    /// Second concentration parameter
    pub fn beta(&self) -> &Tensor {
        &self.beta
    }

    /// Log normalizer ln B(α, β)
    fn log_norm(&self) -> Tensor {
        self.alpha.lgamma() + self.beta.lgamma() - (&self.alpha + &self.beta).lgamma()
    }

    /// Element-wise log density of `x` in `[0, 1]`
    ///
    /// `x` is clamped to `[SUPPORT_EPS, 1 - SUPPORT_EPS]` so actions sitting
    /// exactly on a bound keep a finite log probability.
    pub fn log_prob(&self, x: &Tensor) -> Tensor {
        let x = x.clamp(SUPPORT_EPS, 1.0 - SUPPORT_EPS);
        (&self.alpha - 1.0) * x.log() + (&self.beta - 1.0) * (-&x).log1p() - self.log_norm()
    }

    /// Element-wise differential entropy
    pub fn entropy(&self) -> Tensor {
        let total = &self.alpha + &self.beta;
        self.log_norm() - (&self.alpha - 1.0) * self.alpha.digamma()
            - (&self.beta - 1.0) * self.beta.digamma()
            + (&total - 2.0) * total.digamma()
    }

    /// Distribution mean α / (α + β)
    pub fn mean(&self) -> Tensor {
        &self.alpha / (&self.alpha + &self.beta)
    }

    /// Draw one sample per element via two Gamma variates
    pub fn sample(&self) -> Tensor {
        tch::no_grad(|| {
            let x = self.alpha.internal_standard_gamma();
            let y = self.beta.internal_standard_gamma();
            &x / (&x + &y)
        })
    }
}
