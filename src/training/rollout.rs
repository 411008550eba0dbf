//! Rollout driver: fixed-horizon interaction with the vectorized environment.

use std::time::{Duration, Instant};

use super::buffer::{StepRecord, Trajectory, TrajectoryStore};
use crate::config::TrainingConfig;
use crate::env::VecEnv;
use crate::error::TrainError;
use crate::metrics::{names, MetricsSink, TrainingState};
use crate::policy::PolicyPort;

/// What one rollout produced besides the stored trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutSummary {
    /// Critic estimate of the state following the last stored step, `[num_envs]`.
    pub bootstrap: Vec<f64>,
    /// Episodes that finished during the rollout.
    pub episodes_finished: usize,
    /// Wall time spent collecting.
    pub elapsed: Duration,
}

/// Owns the trajectory store and the lanes' current observations.
///
/// The environment auto-resets finished lanes, so observations carry over
/// from one rollout to the next without any reset here.
#[derive(Debug)]
pub struct RolloutDriver {
    store: TrajectoryStore,
    states: Vec<f64>,
    num_envs: usize,
    obs_dim: usize,
    action_dim: usize,
}

impl RolloutDriver {
    /// Resets `env` with the configured seed and allocates the store.
    pub fn new<E: VecEnv>(env: &mut E, config: &TrainingConfig) -> Result<Self, TrainError> {
        let num_envs = env.num_envs();
        TrainError::check_len("environment lanes", config.num_envs, num_envs)?;
        let obs_dim = env.observation_dim();
        let action_dim = env.action_dim();

        let states = env.reset(Some(config.seed)).map_err(TrainError::Environment)?;
        TrainError::check_len("reset observations", num_envs * obs_dim, states.len())?;

        Ok(Self {
            store: TrajectoryStore::new(
                config.num_steps,
                num_envs,
                obs_dim,
                action_dim,
                config.objective.needs_log_probs(),
            ),
            states,
            num_envs,
            obs_dim,
            action_dim,
        })
    }

    /// Collects one full horizon into the store.
    ///
    /// Finished episodes are reported to `sink` and `state` as they happen;
    /// the global step advances by `num_envs` per time step.
    pub fn collect<E, P, M>(
        &mut self,
        env: &mut E,
        policy: &mut P,
        sink: &mut M,
        state: &mut TrainingState,
    ) -> Result<RolloutSummary, TrainError>
    where
        E: VecEnv,
        P: PolicyPort,
        M: MetricsSink + ?Sized,
    {
        let start = Instant::now();
        let n = self.num_envs;
        let track_log_probs = self.store.tracks_log_probs();
        let mut episodes_finished = 0;
        self.store.reset();

        for _ in 0..self.store.num_steps() {
            state.global_step += n as u64;

            let prediction = policy
                .predict(&self.states, n)
                .map_err(TrainError::Policy)?;
            TrainError::check_len("predicted actions", n * self.action_dim, prediction.actions.len())?;
            TrainError::check_len("predicted values", n, prediction.values.len())?;
            let log_probs = if track_log_probs {
                let lp = prediction.log_probs.as_deref().unwrap_or(&[]);
                TrainError::check_len("predicted log_probs", n, lp.len())?;
                Some(lp)
            } else {
                None
            };

            let step = env
                .step(&prediction.actions)
                .map_err(TrainError::Environment)?;
            TrainError::check_len("next observations", n * self.obs_dim, step.next_states.len())?;
            TrainError::check_len("rewards", n, step.rewards.len())?;
            TrainError::check_len("terminated flags", n, step.terminated.len())?;
            TrainError::check_len("truncated flags", n, step.truncated.len())?;
            if !step.final_episodes.is_empty() {
                TrainError::check_len("final episode slots", n, step.final_episodes.len())?;
            }

            let continuation = step.continuation();
            self.store.push(StepRecord {
                states: &self.states,
                actions: &prediction.actions,
                rewards: &step.rewards,
                continuation: &continuation,
                log_probs,
                values: &prediction.values,
            });

            for lane in 0..n {
                match step.final_episodes.get(lane).copied().flatten() {
                    Some(stats) => {
                        sink.record_scalar(names::EPISODIC_RETURN, stats.episodic_return, state.global_step);
                        sink.record_scalar(names::EPISODIC_LENGTH, stats.length as f64, state.global_step);
                        state.push_episode(stats);
                        episodes_finished += 1;
                    }
                    None if continuation[lane] == 0.0 => {
                        log::warn!("lane {lane} ended an episode without reporting statistics");
                    }
                    None => {}
                }
            }

            self.states = step.next_states;
        }

        let bootstrap = policy
            .critic(&self.states, n)
            .map_err(TrainError::Policy)?;
        TrainError::check_len("bootstrap values", n, bootstrap.len())?;

        Ok(RolloutSummary {
            bootstrap,
            episodes_finished,
            elapsed: start.elapsed(),
        })
    }

    /// The most recently collected trajectory.
    pub fn trajectory(&self) -> Trajectory<'_> {
        self.store.get()
    }

    /// Observations the next rollout will start from.
    pub fn current_states(&self) -> &[f64] {
        &self.states
    }
}
