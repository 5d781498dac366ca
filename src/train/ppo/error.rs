//! Numerical failures during an update

use std::fmt;

/// Which optimization loop produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Clipped surrogate policy update
    Policy,
    /// Clipped value update
    Value,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePhase::Policy => write!(f, "policy"),
            UpdatePhase::Value => write!(f, "value"),
        }
    }
}

/// A non-finite quantity met during an update
///
/// Loss and gradient failures are raised before the optimizer step, so the
/// parameters keep the state of the last successful step. A non-finite
/// statistic is detected right after a step and means that step produced
/// unusable parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalError {
    /// Loss evaluated to NaN or infinity
    NonFiniteLoss {
        /// Loop that produced the loss
        phase: UpdatePhase,
        /// Zero-based epoch within that loop
        epoch: usize,
        /// Offending loss value
        value: f64,
    },

    /// A finite loss backpropagated to NaN or infinite gradients
    NonFiniteGradient {
        /// Loop that produced the gradients
        phase: UpdatePhase,
        /// Zero-based epoch within that loop
        epoch: usize,
    },

    /// KL divergence (policy) or value MSE evaluated to NaN or infinity after a step
    NonFiniteStatistic {
        /// Loop that produced the statistic
        phase: UpdatePhase,
        /// Zero-based epoch within that loop
        epoch: usize,
        /// Offending statistic
        value: f64,
    },
}

impl fmt::Display for NumericalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalError::NonFiniteLoss { phase, epoch, value } => {
                write!(f, "{} loss is {} at epoch {}", phase, value, epoch)
            }
            NumericalError::NonFiniteGradient { phase, epoch } => {
                write!(f, "{} gradients are not finite at epoch {}", phase, epoch)
            }
            NumericalError::NonFiniteStatistic { phase, epoch, value } => {
                write!(f, "{} stopping statistic is {} after epoch {}", phase, value, epoch)
            }
        }
    }
}

impl std::error::Error for NumericalError {}
