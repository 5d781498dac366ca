//! Trajectory and batch storage
//!
//! A [`Trajectory`] holds one rollout as `[L, n_states]` states, `[L]` or
//! `[L, n_actions]` actions and `[L]` rewards. The last step carries a state
//! and an action but no following reward, so policy optimization only uses
//! the first `L - 1` steps ("without finish").
//!
//! A [`Batch`] is the validated set of trajectories handed to one agent
//! update. Every shape check happens here so an update never starts on
//! malformed input.

use std::fmt;

use anyhow::Result;
use tch::{Device, Kind, Tensor};

/// Minimum number of steps in a trajectory (one transition)
pub const MIN_TRAJECTORY_LEN: i64 = 2;

/// Input validation errors for trajectories and batches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// No trajectories were supplied
    Empty,

    /// The states, actions and rewards collections differ in length
    TrajectoryCountMismatch {
        /// Number of state tensors
        states: usize,
        /// Number of action tensors
        actions: usize,
        /// Number of reward tensors
        rewards: usize,
    },

    /// A trajectory has fewer than [`MIN_TRAJECTORY_LEN`] steps
    TooShort {
        /// Trajectory index within the batch
        index: usize,
        /// Number of steps found
        len: i64,
    },

    /// States, actions and rewards of one trajectory disagree in length
    LengthMismatch {
        /// Trajectory index within the batch
        index: usize,
        /// Steps in the state tensor
        states: i64,
        /// Steps in the action tensor
        actions: i64,
        /// Steps in the reward tensor
        rewards: i64,
    },

    /// A tensor has an unsupported rank
    BadRank {
        /// Trajectory index within the batch
        index: usize,
        /// Which tensor ("states", "actions" or "rewards")
        tensor: &'static str,
        /// Shape found
        shape: Vec<i64>,
    },

    /// Trajectories disagree on the state or action width
    InconsistentWidth {
        /// Trajectory index within the batch
        index: usize,
        /// Which tensor ("states" or "actions")
        tensor: &'static str,
        /// Width of the first trajectory
        expected: Vec<i64>,
        /// Width of this trajectory
        found: Vec<i64>,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Empty => write!(f, "batch contains no trajectories"),
            BatchError::TrajectoryCountMismatch { states, actions, rewards } => write!(
                f,
                "got {} state, {} action and {} reward trajectories",
                states, actions, rewards
            ),
            BatchError::TooShort { index, len } => write!(
                f,
                "trajectory {} has {} steps, need at least {}",
                index, len, MIN_TRAJECTORY_LEN
            ),
            BatchError::LengthMismatch { index, states, actions, rewards } => write!(
                f,
                "trajectory {} has {} states, {} actions and {} rewards",
                index, states, actions, rewards
            ),
            BatchError::BadRank { index, tensor, shape } => {
                write!(f, "trajectory {} has {} of unsupported shape {:?}", index, tensor, shape)
            }
            BatchError::InconsistentWidth { index, tensor, expected, found } => write!(
                f,
                "trajectory {} has {} trailing shape {:?}, expected {:?}",
                index, tensor, found, expected
            ),
        }
    }
}

impl std::error::Error for BatchError {}

/// One rollout of states, actions and rewards
#[derive(Debug)]
pub struct Trajectory {
    states: Tensor,
    actions: Tensor,
    rewards: Vec<f32>,
}

impl Trajectory {
    /// Create a trajectory from tensors, validating shapes
    ///
    /// # Arguments
    ///
    /// * `states` - `[L, n_states]`
    /// * `actions` - `[L]` or `[L, n_actions]`
    /// * `rewards` - `[L]`
    pub fn new(states: &Tensor, actions: &Tensor, rewards: &Tensor) -> Result<Self> {
        Self::validated(0, states, actions, rewards)
    }

    /// Create a trajectory from plain vectors (one inner vector per step)
    pub fn from_vecs(states: &[Vec<f32>], actions: &[Vec<f32>], rewards: &[f32]) -> Result<Self> {
        let states = rows_to_tensor(states)?;
        let actions = rows_to_tensor(actions)?;
        let rewards = Tensor::from_slice(rewards);
        Self::new(&states, &actions, &rewards)
    }

    fn validated(index: usize, states: &Tensor, actions: &Tensor, rewards: &Tensor) -> Result<Self> {
        if states.dim() != 2 {
            return Err(BatchError::BadRank { index, tensor: "states", shape: states.size() }.into());
        }
        if !(1..=2).contains(&actions.dim()) {
            return Err(BatchError::BadRank { index, tensor: "actions", shape: actions.size() }.into());
        }
        if rewards.dim() != 1 {
            return Err(BatchError::BadRank { index, tensor: "rewards", shape: rewards.size() }.into());
        }

        let (n_states, n_actions, n_rewards) = (states.size()[0], actions.size()[0], rewards.size()[0]);
        if n_states != n_actions || n_states != n_rewards {
            return Err(BatchError::LengthMismatch {
                index,
                states: n_states,
                actions: n_actions,
                rewards: n_rewards,
            }
            .into());
        }
        if n_states < MIN_TRAJECTORY_LEN {
            return Err(BatchError::TooShort { index, len: n_states }.into());
        }

        let rewards = rewards.to_device(Device::Cpu).to_kind(Kind::Float).contiguous();
        let rewards = Vec::<f32>::try_from(&rewards)?;

        Ok(Self {
            states: states.to_kind(Kind::Float),
            actions: actions.to_kind(Kind::Float),
            rewards,
        })
    }

    /// Number of steps, including the final one
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Always false: a validated trajectory has at least two steps
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// All states `[L, n_states]`
    pub fn states(&self) -> &Tensor {
        &self.states
    }

    /// All actions `[L]` or `[L, n_actions]`
    pub fn actions(&self) -> &Tensor {
        &self.actions
    }

    /// All rewards
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// States of every step except the last `[L - 1, n_states]`
    pub fn states_without_finish(&self) -> Tensor {
        self.states.narrow(0, 0, self.len() as i64 - 1)
    }

    /// Actions of every step except the last
    pub fn actions_without_finish(&self) -> Tensor {
        self.actions.narrow(0, 0, self.len() as i64 - 1)
    }
}

/// A validated, immutable set of trajectories for one update
#[derive(Debug)]
pub struct Batch {
    trajectories: Vec<Trajectory>,
}

impl Batch {
    /// Build a batch from per-trajectory tensors aligned by index
    ///
    /// Fails with a [`BatchError`] (inside the `anyhow::Error`) on the first
    /// malformed trajectory.
    pub fn new(states: &[Tensor], actions: &[Tensor], rewards: &[Tensor]) -> Result<Self> {
        if states.len() != actions.len() || states.len() != rewards.len() {
            return Err(BatchError::TrajectoryCountMismatch {
                states: states.len(),
                actions: actions.len(),
                rewards: rewards.len(),
            }
            .into());
        }

        let trajectories = states
            .iter()
            .zip(actions)
            .zip(rewards)
            .enumerate()
            .map(|(index, ((s, a), r))| Trajectory::validated(index, s, a, r))
            .collect::<Result<Vec<_>>>()?;

        Self::from_trajectories(trajectories)
    }

    /// Build a batch from already constructed trajectories
    pub fn from_trajectories(trajectories: Vec<Trajectory>) -> Result<Self> {
        let first = trajectories.first().ok_or(BatchError::Empty)?;
        let state_width = first.states.size()[1..].to_vec();
        let action_width = first.actions.size()[1..].to_vec();

        for (index, trajectory) in trajectories.iter().enumerate().skip(1) {
            let found = trajectory.states.size()[1..].to_vec();
            if found != state_width {
                return Err(BatchError::InconsistentWidth {
                    index,
                    tensor: "states",
                    expected: state_width,
                    found,
                }
                .into());
            }
            let found = trajectory.actions.size()[1..].to_vec();
            if found != action_width {
                return Err(BatchError::InconsistentWidth {
                    index,
                    tensor: "actions",
                    expected: action_width,
                    found,
                }
                .into());
            }
        }

        Ok(Self { trajectories })
    }

    /// Number of trajectories
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    /// Always false for a constructed batch
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Iterate over trajectories in order
    pub fn iter(&self) -> std::slice::Iter<'_, Trajectory> {
        self.trajectories.iter()
    }

    /// Width of one state vector
    pub fn state_dim(&self) -> i64 {
        self.trajectories[0].states.size()[1]
    }

    /// Width of one action vector (`[L]` actions have width 1)
    pub fn action_dim(&self) -> i64 {
        self.trajectories[0].actions.size().get(1).copied().unwrap_or(1)
    }

    /// Total number of steps across trajectories
    pub fn total_steps(&self) -> usize {
        self.trajectories.iter().map(Trajectory::len).sum()
    }

    /// Total number of steps that have a following reward
    pub fn total_transitions(&self) -> usize {
        self.total_steps() - self.trajectories.len()
    }

    /// All states concatenated `[total_steps, n_states]`
    pub fn states(&self, device: Device) -> Tensor {
        let parts: Vec<Tensor> = self.trajectories.iter().map(|t| t.states.shallow_clone()).collect();
        Tensor::cat(&parts, 0).to_device(device)
    }

    /// Without-finish states concatenated `[total_transitions, n_states]`
    pub fn states_without_finish(&self, device: Device) -> Tensor {
        let parts: Vec<Tensor> =
            self.trajectories.iter().map(Trajectory::states_without_finish).collect();
        Tensor::cat(&parts, 0).to_device(device)
    }

    /// Without-finish actions concatenated
    pub fn actions_without_finish(&self, device: Device) -> Tensor {
        let parts: Vec<Tensor> =
            self.trajectories.iter().map(Trajectory::actions_without_finish).collect();
        Tensor::cat(&parts, 0).to_device(device)
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Trajectory;
    type IntoIter = std::slice::Iter<'a, Trajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.trajectories.iter()
    }
}

fn rows_to_tensor(rows: &[Vec<f32>]) -> Result<Tensor> {
    let width = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != width) {
        anyhow::bail!("rows have differing widths");
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_slice(&flat).reshape([rows.len() as i64, width as i64]))
}
