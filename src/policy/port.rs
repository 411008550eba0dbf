//! Boundary to the trainable function approximator.

use super::tensor::LossTensor;
use crate::error::BoxError;

/// Output of [`PolicyPort::predict`] for a batch of lanes.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Sampled actions, `[num_envs, action_dim]`. Discrete actions are stored
    /// as their index.
    pub actions: Vec<f64>,
    /// Log-probabilities of the sampled actions, `[num_envs]`. `None` when the
    /// port does not report them (A2C-only ports).
    pub log_probs: Option<Vec<f64>>,
    /// Critic estimates of the input states, `[num_envs]`.
    pub values: Vec<f64>,
}

/// Output of [`PolicyPort::evaluate`]; tensors stay attached to the port's
/// gradient graph.
#[derive(Debug)]
pub struct Evaluation<T> {
    /// Log-probabilities of the given actions under the current policy.
    pub log_probs: T,
    /// Per-row policy entropy.
    pub entropy: T,
    /// Critic predictions.
    pub values: T,
}

/// Policy/value function approximator driven by the training pipeline.
///
/// The pipeline never touches parameters directly; it only calls this
/// contract. Calls are synchronous, and `predict`/`evaluate` are never
/// issued concurrently with `update`.
pub trait PolicyPort {
    /// Tensor type the objectives are computed with.
    type Tensor: LossTensor;

    /// Samples actions for `num_envs` states (`[num_envs, obs_dim]` row-major).
    fn predict(&mut self, states: &[f64], num_envs: usize) -> Result<Prediction, BoxError>;

    /// Critic estimates only, `[num_envs]`.
    fn critic(&mut self, states: &[f64], num_envs: usize) -> Result<Vec<f64>, BoxError>;

    /// Re-scores `rows` stored (state, action) pairs under the current parameters.
    fn evaluate(
        &mut self,
        states: &[f64],
        actions: &[f64],
        rows: usize,
    ) -> Result<Evaluation<Self::Tensor>, BoxError>;

    /// Backpropagates `loss`, clips the global gradient norm, and steps the optimizer.
    fn update(&mut self, loss: &Self::Tensor) -> Result<(), BoxError>;

    /// Overrides the optimizer's learning rate.
    fn set_learning_rate(&mut self, lr: f64);
}
