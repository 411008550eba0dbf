//! Training loop: rollout → advantages → batch → update, per iteration.

use std::time::Instant;

use super::batch::Batch;
use super::gae::compute_gae;
use super::rollout::{RolloutDriver, RolloutSummary};
use super::update::{UpdateEngine, UpdateReport};
use crate::config::TrainingConfig;
use crate::env::VecEnv;
use crate::error::TrainError;
use crate::metrics::{names, MetricsSink, TrainingState, TrainingSummary};
use crate::policy::PolicyPort;

/// Outcome of one training iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// 0-based iteration index.
    pub update_index: usize,
    /// Learning rate applied for this iteration.
    pub learning_rate: f64,
    pub rollout: RolloutSummary,
    pub update: UpdateReport,
}

/// On-policy trainer over a vectorized environment and a policy port.
///
/// Runs `total_timesteps / (num_steps × num_envs)` iterations with no early
/// stopping. Counters live in an explicit [`TrainingState`].
pub struct Trainer<E, P, M> {
    config: TrainingConfig,
    env: E,
    policy: P,
    sink: M,
    driver: RolloutDriver,
    engine: UpdateEngine,
    state: TrainingState,
    started: Instant,
}

impl<E, P, M> Trainer<E, P, M>
where
    E: VecEnv,
    P: PolicyPort,
    M: MetricsSink,
{
    /// Validates `config`, resets `env`, and allocates the rollout store.
    ///
    /// Configuration errors surface here, before any environment step.
    pub fn new(config: TrainingConfig, mut env: E, policy: P, sink: M) -> Result<Self, TrainError> {
        config.validate()?;
        let driver = RolloutDriver::new(&mut env, &config)?;
        let engine = UpdateEngine::new(&config);
        log::info!(
            "{} trainer: {} updates of {} steps x {} envs",
            config.objective.name(),
            config.num_updates(),
            config.num_steps,
            config.num_envs
        );
        Ok(Self {
            config,
            env,
            policy,
            sink,
            driver,
            engine,
            state: TrainingState::new(),
            started: Instant::now(),
        })
    }

    /// Total number of iterations [`train`](Self::train) will run.
    pub fn num_updates(&self) -> usize {
        self.config.num_updates()
    }

    /// Runs every remaining iteration and returns the run summary.
    pub fn train(&mut self) -> Result<TrainingSummary, TrainError> {
        while self.state.updates < self.num_updates() {
            let report = self.run_iteration()?;
            if report.update_index % 10 == 0 {
                log::info!(
                    "[Update {}/{}] step={} mean_return={} loss={:.4}",
                    report.update_index,
                    self.num_updates(),
                    self.state.global_step,
                    self.state
                        .recent_mean_return(5)
                        .map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}")),
                    report.update.loss
                );
            }
        }
        let summary = self.state.summary();
        log::info!(
            "training finished after {} steps, {} episodes",
            summary.global_step,
            summary.episodes
        );
        Ok(summary)
    }

    /// Runs one rollout → advantage → update iteration.
    pub fn run_iteration(&mut self) -> Result<IterationReport, TrainError> {
        let update_index = self.state.updates;
        let learning_rate = self.config.learning_rate_at(update_index);
        if learning_rate == 0.0 {
            log::warn!("learning rate annealed to zero at update {update_index}");
        }
        self.policy.set_learning_rate(learning_rate);

        let rollout = self.driver.collect(
            &mut self.env,
            &mut self.policy,
            &mut self.sink,
            &mut self.state,
        )?;

        let trajectory = self.driver.trajectory();
        let advantages = compute_gae(
            trajectory.rewards,
            trajectory.values,
            trajectory.continuation,
            &rollout.bootstrap,
            self.config.gamma,
            self.config.gae_lambda,
        );
        let mut batch = Batch::from_trajectory(&trajectory, advantages);
        if self.config.normalize_advantages {
            batch.normalize_advantages();
        }

        let update = self.engine.run(&mut self.policy, &batch)?;
        self.state.updates += 1;
        self.record(learning_rate, &update);

        Ok(IterationReport {
            update_index,
            learning_rate,
            rollout,
            update,
        })
    }

    fn record(&mut self, learning_rate: f64, update: &UpdateReport) {
        let step = self.state.global_step;
        let sink = &mut self.sink;
        sink.record_scalar(names::LEARNING_RATE, learning_rate, step);
        sink.record_scalar(names::LOSS, update.loss, step);
        sink.record_scalar(names::POLICY_LOSS, update.policy_loss, step);
        sink.record_scalar(names::VALUE_LOSS, update.value_loss, step);
        sink.record_scalar(names::ENTROPY, update.entropy, step);
        if let Some(diag) = update.diagnostics {
            sink.record_scalar(names::OLD_APPROX_KL, diag.old_approx_kl, step);
            sink.record_scalar(names::APPROX_KL, diag.approx_kl, step);
            sink.record_scalar(names::CLIP_FRACTION, diag.clip_fraction, step);
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            sink.record_scalar(names::SPS, step as f64 / elapsed, step);
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Consumes the trainer, returning the environment, policy, and sink.
    pub fn into_parts(self) -> (E, P, M) {
        (self.env, self.policy, self.sink)
    }
}
