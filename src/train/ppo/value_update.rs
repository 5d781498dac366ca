//! Clipped value function update
//!
//! Fits the value network to the discounted returns with a pessimistic
//! clipped loss. Training stops once the value estimates drift further from
//! the pre-update snapshot than `value_mse_stop` allows.

use anyhow::Result;
use tch::Tensor;

use super::{
    config::PPOConfig,
    error::{NumericalError, UpdatePhase},
    learner::Learner,
    loss::{compute_value_loss, value_drift},
    stats::ValueUpdateStats,
};
use crate::policy::ValueNetwork;

/// Optimize the value network against fixed returns
///
/// # Arguments
///
/// * `learner` - Value network and its optimizer
/// * `states` - All states of the batch `[M, n_states]`
/// * `returns` - Discounted returns `[M]`
/// * `old_values` - Value estimates captured before the agent update `[M]`
/// * `config` - Epoch budget, clip range and MSE threshold
pub fn run_value_update<V: ValueNetwork>(
    learner: &mut Learner<V>,
    states: &Tensor,
    returns: &Tensor,
    old_values: &Tensor,
    config: &PPOConfig,
) -> Result<ValueUpdateStats> {
    let mut stats = ValueUpdateStats::with_capacity(config.value_epochs);

    for epoch in 0..config.value_epochs {
        let values = learner.net().evaluate(states);
        let loss = compute_value_loss(&values, old_values, returns, config.value_clip);

        let loss_val = f64::try_from(&loss)?;
        if !loss_val.is_finite() {
            return Err(NumericalError::NonFiniteLoss {
                phase: UpdatePhase::Value,
                epoch,
                value: loss_val,
            }
            .into());
        }

        if !learner.step(&loss) {
            return Err(NumericalError::NonFiniteGradient { phase: UpdatePhase::Value, epoch }.into());
        }

        let mse = tch::no_grad(|| value_drift(old_values, &learner.net().evaluate(states)));
        let mse = f64::try_from(&mse)?;
        if !mse.is_finite() {
            return Err(NumericalError::NonFiniteStatistic {
                phase: UpdatePhase::Value,
                epoch,
                value: mse,
            }
            .into());
        }

        stats.push(loss_val, mse);

        tracing::debug!("Value epoch {}: loss {:.5}, MSE {:.5}", epoch, loss_val, mse);

        if mse > config.value_mse_stop {
            tracing::info!(
                "Value training stopped early after {} epochs (MSE {:.4} > {:.4})",
                epoch + 1,
                mse,
                config.value_mse_stop
            );
            break;
        }
    }

    Ok(stats)
}
