//! On-policy training pipeline.
//!
//! Provides the trajectory store, GAE computation, batch flattening, the
//! A2C/PPO objectives, the rollout driver, the update engine, and the trainer
//! that orchestrates them.

pub mod batch;
pub mod buffer;
pub mod gae;
pub mod objective;
pub mod rollout;
pub mod trainer;
pub mod update;

pub use batch::{normalize_advantages, shuffled_minibatches, Batch};
pub use buffer::{StepRecord, Trajectory, TrajectoryStore};
pub use gae::{compute_gae, Advantages};
pub use objective::{LossCoefficients, LossComponents, PpoDiagnostics};
pub use rollout::{RolloutDriver, RolloutSummary};
pub use trainer::{IterationReport, Trainer};
pub use update::{UpdateEngine, UpdateReport};
