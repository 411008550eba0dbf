//! rollout_rl - On-policy actor-critic training (PPO and A2C)
//!
//! Collects fixed-horizon rollouts from a vectorized environment, computes
//! GAE advantages, and runs clipped-PPO or A2C updates through a
//! [`PolicyPort`]. The tch-backed network lives behind the `rl-nn` feature.

pub mod config;
pub mod env;
pub mod error;
pub mod metrics;
#[cfg(feature = "rl-nn")]
pub mod nn;
pub mod policy;
pub mod replay;
pub mod training;

pub use config::{Objective, TrainingConfig};
pub use env::{Env, EpisodeStats, SyncVecEnv, VecEnv, VecStep};
pub use error::{BoxError, ConfigError, TrainError};
pub use metrics::{MetricsSink, TrainingState, TrainingSummary};
pub use policy::{Evaluation, HostTensor, LossTensor, PolicyPort, Prediction};
pub use training::{compute_gae, Trainer};
