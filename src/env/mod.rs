//! Environment collaborator interface.
//!
//! The training pipeline only talks to [`VecEnv`]: a synchronous batched
//! step/reset over `num_envs` lanes that auto-resets finished lanes itself.
//! [`SyncVecEnv`] builds one from independent single-instance [`Env`]s.

pub mod line_walk;
pub mod vector;

pub use line_walk::LineWalk;
pub use vector::SyncVecEnv;

use crate::error::BoxError;

/// Statistics of an episode that ended during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeStats {
    /// Undiscounted sum of rewards.
    pub episodic_return: f64,
    /// Number of steps in the episode.
    pub length: usize,
}

/// Result of stepping every lane once.
#[derive(Debug, Clone, PartialEq)]
pub struct VecStep {
    /// Next observations, `[num_envs, obs_dim]`. For a lane whose episode just
    /// ended this is already the first observation of the next episode.
    pub next_states: Vec<f64>,
    pub rewards: Vec<f64>,
    /// Episode reached a terminal state.
    pub terminated: Vec<bool>,
    /// Episode was cut short (time limit).
    pub truncated: Vec<bool>,
    /// Per-lane statistics for episodes that ended this step. May be empty if
    /// the environment does not record them.
    pub final_episodes: Vec<Option<EpisodeStats>>,
}

impl VecStep {
    /// Continuation mask: 0.0 where the lane's episode ended, 1.0 otherwise.
    pub fn continuation(&self) -> Vec<f64> {
        self.terminated
            .iter()
            .zip(&self.truncated)
            .map(|(&term, &trunc)| if term || trunc { 0.0 } else { 1.0 })
            .collect()
    }
}

/// Vectorized environment over `num_envs` lanes.
pub trait VecEnv {
    fn num_envs(&self) -> usize;

    /// Flattened observation width per lane.
    fn observation_dim(&self) -> usize;

    /// Flattened action width per lane (1 for a discrete action index).
    fn action_dim(&self) -> usize;

    /// Resets every lane and returns the initial observations.
    fn reset(&mut self, seed: Option<u64>) -> Result<Vec<f64>, BoxError>;

    /// Steps every lane with `actions` (`[num_envs, action_dim]`).
    fn step(&mut self, actions: &[f64]) -> Result<VecStep, BoxError>;
}

/// One step of a single environment instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
}

/// Single environment instance.
pub trait Env {
    fn observation_dim(&self) -> usize;
    fn action_dim(&self) -> usize;
    fn reset(&mut self, seed: Option<u64>) -> Result<Vec<f64>, BoxError>;
    fn step(&mut self, action: &[f64]) -> Result<EnvStep, BoxError>;
}
