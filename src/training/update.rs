//! Update engine: shuffled minibatch epochs through the policy port.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::batch::{shuffled_minibatches, Batch};
use super::objective::{LossCoefficients, LossComponents, PpoDiagnostics};
use crate::config::{Objective, TrainingConfig};
use crate::error::TrainError;
use crate::policy::{LossTensor, PolicyPort};

/// Averages over every gradient step of one update phase.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    /// Number of `PolicyPort::update` calls made.
    pub gradient_steps: usize,
    pub loss: f64,
    pub policy_loss: f64,
    pub value_loss: f64,
    pub entropy: f64,
    /// PPO only.
    pub diagnostics: Option<PpoDiagnostics>,
}

/// Runs the configured objective over a flattened batch.
///
/// A2C takes a single step over the whole batch. PPO runs `num_optims`
/// epochs; each epoch draws a fresh permutation and walks it in contiguous
/// minibatches.
#[derive(Debug)]
pub struct UpdateEngine {
    objective: Objective,
    coefs: LossCoefficients,
    minibatch_size: usize,
    rng: StdRng,
}

impl UpdateEngine {
    /// Creates an engine from a validated configuration.
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            objective: config.objective,
            coefs: LossCoefficients {
                value_coef: config.value_coef,
                entropy_coef: config.entropy_coef,
            },
            minibatch_size: config.minibatch_size(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Performs every gradient step for one iteration.
    ///
    /// Fails before touching the policy if any advantage is non-finite, and
    /// stops at the first non-finite loss without applying it.
    pub fn run<P: PolicyPort>(
        &mut self,
        policy: &mut P,
        batch: &Batch,
    ) -> Result<UpdateReport, TrainError> {
        batch.ensure_finite_advantages()?;

        let mut acc = Accumulator::default();
        match self.objective {
            Objective::A2c => {
                let components = self.step(policy, batch, 0, 0)?;
                acc.add(&components);
            }
            Objective::Ppo { num_optims, .. } => {
                for epoch in 0..num_optims {
                    let minibatches =
                        shuffled_minibatches(batch.len(), self.minibatch_size, &mut self.rng);
                    for (index, rows) in minibatches.iter().enumerate() {
                        let minibatch = batch.select(rows);
                        let components = self.step(policy, &minibatch, epoch, index)?;
                        acc.add(&components);
                    }
                }
            }
        }
        Ok(acc.finish())
    }

    fn step<P: PolicyPort>(
        &self,
        policy: &mut P,
        minibatch: &Batch,
        epoch: usize,
        index: usize,
    ) -> Result<LossComponents<P::Tensor>, TrainError> {
        let evaluation = policy
            .evaluate(&minibatch.states, &minibatch.actions, minibatch.len())
            .map_err(TrainError::Policy)?;
        let rows = minibatch.len();
        TrainError::check_len("evaluated log_probs", rows, evaluation.log_probs.values().len())?;
        TrainError::check_len("evaluated entropy", rows, evaluation.entropy.values().len())?;
        TrainError::check_len("evaluated values", rows, evaluation.values.values().len())?;
        let components = self
            .objective
            .compute_update(&evaluation, minibatch, self.coefs)?;

        let loss = components.total.scalar();
        if !loss.is_finite() {
            return Err(TrainError::NonFiniteLoss {
                epoch,
                minibatch: index,
                value: loss,
            });
        }

        policy
            .update(&components.total)
            .map_err(TrainError::Policy)?;

        if let Some(diag) = components.diagnostics {
            log::debug!(
                "epoch {epoch} minibatch {index}: loss={loss:.5} approx_kl={:.5} clipfrac={:.3}",
                diag.approx_kl,
                diag.clip_fraction
            );
        }
        Ok(components)
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    steps: usize,
    loss: f64,
    policy_loss: f64,
    value_loss: f64,
    entropy: f64,
    old_approx_kl: f64,
    approx_kl: f64,
    clip_fraction: f64,
    has_diagnostics: bool,
}

impl Accumulator {
    fn add<T: LossTensor>(&mut self, c: &LossComponents<T>) {
        self.steps += 1;
        self.loss += c.total.scalar();
        self.policy_loss += c.policy_loss;
        self.value_loss += c.value_loss;
        self.entropy += c.entropy;
        if let Some(d) = c.diagnostics {
            self.has_diagnostics = true;
            self.old_approx_kl += d.old_approx_kl;
            self.approx_kl += d.approx_kl;
            self.clip_fraction += d.clip_fraction;
        }
    }

    fn finish(self) -> UpdateReport {
        let n = self.steps.max(1) as f64;
        UpdateReport {
            gradient_steps: self.steps,
            loss: self.loss / n,
            policy_loss: self.policy_loss / n,
            value_loss: self.value_loss / n,
            entropy: self.entropy / n,
            diagnostics: self.has_diagnostics.then(|| PpoDiagnostics {
                old_approx_kl: self.old_approx_kl / n,
                approx_kl: self.approx_kl / n,
                clip_fraction: self.clip_fraction / n,
            }),
        }
    }
}
