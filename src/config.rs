//! Training configuration for the on-policy pipeline.
//!
//! All hyperparameters live in [`TrainingConfig`]; the update rule is picked
//! by the tagged [`Objective`]. Call [`TrainingConfig::validate`] before any
//! rollout so configuration errors fail fast.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Closed set of policy-gradient update rules.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Objective {
    /// One un-clipped gradient step over the whole flattened batch.
    A2c,
    /// Clipped surrogate, `num_optims` shuffled epochs of `num_minibatches`
    /// minibatches each.
    Ppo {
        /// Clip parameter ε of the importance ratio.
        clip_eps: f64,
        /// Number of optimization epochs per rollout.
        num_optims: usize,
        /// Number of minibatches each epoch is split into.
        num_minibatches: usize,
    },
}

impl Objective {
    /// Whether rollouts must record the behaviour policy's log-probabilities.
    pub fn needs_log_probs(&self) -> bool {
        matches!(self, Objective::Ppo { .. })
    }

    /// Short identifier used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Objective::A2c => "a2c",
            Objective::Ppo { .. } => "ppo",
        }
    }
}

impl Default for Objective {
    fn default() -> Self {
        Objective::Ppo {
            clip_eps: 0.2,
            num_optims: 10,
            num_minibatches: 32,
        }
    }
}

/// Hyperparameters of one training run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainingConfig {
    // --- Budget ---
    /// Total environment steps across all lanes.
    pub total_timesteps: usize,
    /// Number of parallel environment lanes.
    pub num_envs: usize,
    /// Rollout horizon per lane.
    pub num_steps: usize,

    // --- Returns ---
    /// Discount factor γ.
    pub gamma: f64,
    /// GAE trace-decay λ (0 = one-step TD, 1 = Monte Carlo).
    pub gae_lambda: f64,
    /// Normalize advantages per batch to zero mean and unit variance.
    pub normalize_advantages: bool,

    // --- Loss ---
    /// Update rule.
    pub objective: Objective,
    /// Critic loss coefficient.
    pub value_coef: f64,
    /// Entropy bonus coefficient.
    pub entropy_coef: f64,

    // --- Optimizer ---
    /// Base learning rate.
    pub learning_rate: f64,
    /// Linearly decay the learning rate to zero over the run.
    pub anneal_lr: bool,
    /// Global gradient-norm bound applied by the policy port.
    pub max_grad_norm: f64,

    // --- Function approximator ---
    /// Hidden layer widths of the actor-critic MLP.
    pub hidden_layers: Vec<usize>,
    /// Share the hidden torso between actor and critic.
    pub shared_network: bool,

    /// Seed for environment resets and minibatch shuffling.
    pub seed: u64,
}

impl TrainingConfig {
    /// Preset matching the A2C setup: short horizon, many lanes, one pass.
    pub fn a2c() -> Self {
        Self {
            total_timesteps: 5_000_000,
            num_envs: 16,
            num_steps: 5,
            gae_lambda: 1.0,
            objective: Objective::A2c,
            learning_rate: 7e-4,
            anneal_lr: false,
            ..Self::default()
        }
    }

    /// Transitions collected per rollout (`num_steps × num_envs`).
    pub fn batch_size(&self) -> usize {
        self.num_steps * self.num_envs
    }

    /// Rows per gradient step.
    pub fn minibatch_size(&self) -> usize {
        match self.objective {
            Objective::A2c => self.batch_size(),
            Objective::Ppo {
                num_minibatches, ..
            } => self.batch_size() / num_minibatches.max(1),
        }
    }

    /// Number of rollout/update iterations in the run.
    pub fn num_updates(&self) -> usize {
        match self.batch_size() {
            0 => 0,
            batch => self.total_timesteps / batch,
        }
    }

    /// Learning rate for iteration `update_index` (0-based).
    ///
    /// `base_lr × (1 − update_index / num_updates)` when annealing, otherwise
    /// the base rate.
    pub fn learning_rate_at(&self, update_index: usize) -> f64 {
        let num_updates = self.num_updates();
        if !self.anneal_lr || num_updates == 0 {
            return self.learning_rate;
        }
        let frac = 1.0 - update_index as f64 / num_updates as f64;
        self.learning_rate * frac.max(0.0)
    }

    /// Checks the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_steps == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.num_envs == 0 {
            return Err(ConfigError::ZeroLanes);
        }
        check_unit_interval("gamma", self.gamma)?;
        check_unit_interval("gae_lambda", self.gae_lambda)?;
        check_positive("learning_rate", self.learning_rate)?;
        check_positive("max_grad_norm", self.max_grad_norm)?;
        check_non_negative("value_coef", self.value_coef)?;
        check_non_negative("entropy_coef", self.entropy_coef)?;

        if let Objective::Ppo {
            clip_eps,
            num_optims,
            num_minibatches,
        } = self.objective
        {
            check_positive("clip_eps", clip_eps)?;
            if num_optims == 0 {
                return Err(ConfigError::ZeroEpochs);
            }
            if num_minibatches == 0 {
                return Err(ConfigError::ZeroMinibatches);
            }
            if self.batch_size() % num_minibatches != 0 {
                return Err(ConfigError::IndivisibleBatch {
                    batch_size: self.batch_size(),
                    num_minibatches,
                });
            }
        }

        if self.total_timesteps < self.batch_size() {
            return Err(ConfigError::TooFewTimesteps {
                total_timesteps: self.total_timesteps,
                batch_size: self.batch_size(),
            });
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            total_timesteps: 1_000_000,
            num_envs: 1,
            num_steps: 2048,
            gamma: 0.99,
            gae_lambda: 0.95,
            normalize_advantages: true,
            objective: Objective::default(),
            value_coef: 0.5,
            entropy_coef: 0.01,
            learning_rate: 3e-4,
            anneal_lr: true,
            max_grad_norm: 0.5,
            hidden_layers: vec![64, 64],
            shared_network: false,
            seed: 0,
        }
    }
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    // NaN fails this comparison as well.
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: f64::INFINITY,
        })
    }
}
