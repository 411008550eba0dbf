//! Policy-gradient loss objectives.
//!
//! Each [`Objective`] variant turns a re-scored minibatch into a scalar loss
//! plus host-side loss components for logging:
//!
//! - A2C: `-mean(log_prob · A) + c_v · mean((R − V)²) − c_e · mean(H)`
//! - PPO: `-mean(min(ρ·A, clip(ρ, 1−ε, 1+ε)·A)) + c_v · mean((R − V)²) − c_e · mean(H)`
//!   with `ρ = exp(log_prob − old_log_prob)`

use super::batch::Batch;
use crate::config::Objective;
use crate::error::TrainError;
use crate::policy::{Evaluation, LossTensor};

/// Critic and entropy weights of the total loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossCoefficients {
    pub value_coef: f64,
    pub entropy_coef: f64,
}

/// Approximate KL and clipping statistics of one PPO minibatch.
///
/// Observability only; never feeds back into control flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PpoDiagnostics {
    /// `mean(−log ρ)`
    pub old_approx_kl: f64,
    /// `mean((ρ − 1) − log ρ)`
    pub approx_kl: f64,
    /// Fraction of rows with `|ρ − 1| > ε`.
    pub clip_fraction: f64,
}

impl PpoDiagnostics {
    /// Computes the diagnostics from per-row log-ratios.
    pub fn from_log_ratios(log_ratios: &[f64], clip_eps: f64) -> Self {
        let n = log_ratios.len().max(1) as f64;
        let mut old_kl = 0.0;
        let mut kl = 0.0;
        let mut clipped = 0usize;
        for &lr in log_ratios {
            let ratio = lr.exp();
            old_kl += -lr;
            kl += (ratio - 1.0) - lr;
            if (ratio - 1.0).abs() > clip_eps {
                clipped += 1;
            }
        }
        Self {
            old_approx_kl: old_kl / n,
            approx_kl: kl / n,
            clip_fraction: clipped as f64 / n,
        }
    }
}

/// Loss of one gradient step.
#[derive(Debug)]
pub struct LossComponents<T> {
    /// Differentiable total loss handed to the policy port.
    pub total: T,
    /// Actor term.
    pub policy_loss: f64,
    /// Unweighted critic mean squared error.
    pub value_loss: f64,
    /// Mean policy entropy.
    pub entropy: f64,
    /// PPO only.
    pub diagnostics: Option<PpoDiagnostics>,
}

impl Objective {
    /// Builds the loss for `minibatch` from its re-scored `evaluation`.
    pub fn compute_update<T: LossTensor>(
        &self,
        evaluation: &Evaluation<T>,
        minibatch: &Batch,
        coefs: LossCoefficients,
    ) -> Result<LossComponents<T>, TrainError> {
        match *self {
            Objective::A2c => Ok(a2c_loss(evaluation, minibatch, coefs)),
            Objective::Ppo { clip_eps, .. } => ppo_loss(evaluation, minibatch, coefs, clip_eps),
        }
    }
}

/// Un-clipped advantage actor-critic loss.
pub fn a2c_loss<T: LossTensor>(
    evaluation: &Evaluation<T>,
    minibatch: &Batch,
    coefs: LossCoefficients,
) -> LossComponents<T> {
    let like = &evaluation.log_probs;
    let advantages = T::constant(&minibatch.advantages, like);

    let policy_loss = evaluation.log_probs.mul(&advantages).mean().scale(-1.0);
    let (value_loss, entropy) = critic_and_entropy(evaluation, minibatch);
    let total = policy_loss
        .add(&value_loss.scale(coefs.value_coef))
        .sub(&entropy.scale(coefs.entropy_coef));

    LossComponents {
        policy_loss: policy_loss.scalar(),
        value_loss: value_loss.scalar(),
        entropy: entropy.scalar(),
        total,
        diagnostics: None,
    }
}

/// Clipped-surrogate PPO loss.
pub fn ppo_loss<T: LossTensor>(
    evaluation: &Evaluation<T>,
    minibatch: &Batch,
    coefs: LossCoefficients,
    clip_eps: f64,
) -> Result<LossComponents<T>, TrainError> {
    let rows = minibatch.len();
    let old_log_probs = minibatch
        .old_log_probs
        .as_deref()
        .ok_or(TrainError::ShapeMismatch {
            what: "old_log_probs",
            expected: rows,
            actual: 0,
        })?;

    let like = &evaluation.log_probs;
    let old = T::constant(old_log_probs, like);
    let advantages = T::constant(&minibatch.advantages, like);

    let log_ratio = evaluation.log_probs.sub(&old);
    let log_ratio_values = log_ratio.values();
    TrainError::check_len("evaluated log_probs", rows, log_ratio_values.len())?;
    let diagnostics = PpoDiagnostics::from_log_ratios(&log_ratio_values, clip_eps);

    let ratio = log_ratio.exp();
    let surr1 = ratio.mul(&advantages);
    let surr2 = ratio.clamp(1.0 - clip_eps, 1.0 + clip_eps).mul(&advantages);
    let policy_loss = surr1.minimum(&surr2).mean().scale(-1.0);

    let (value_loss, entropy) = critic_and_entropy(evaluation, minibatch);
    let total = policy_loss
        .add(&value_loss.scale(coefs.value_coef))
        .sub(&entropy.scale(coefs.entropy_coef));

    Ok(LossComponents {
        policy_loss: policy_loss.scalar(),
        value_loss: value_loss.scalar(),
        entropy: entropy.scalar(),
        total,
        diagnostics: Some(diagnostics),
    })
}

/// `(mean((R − V)²), mean(H))`
fn critic_and_entropy<T: LossTensor>(evaluation: &Evaluation<T>, minibatch: &Batch) -> (T, T) {
    let targets = T::constant(&minibatch.td_targets, &evaluation.values);
    let value_loss = targets.sub(&evaluation.values).square().mean();
    let entropy = evaluation.entropy.mean();
    (value_loss, entropy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::HostTensor;

    const COEFS: LossCoefficients = LossCoefficients {
        value_coef: 0.5,
        entropy_coef: 0.01,
    };

    fn minibatch(old_log_probs: Option<Vec<f64>>) -> Batch {
        Batch {
            obs_dim: 1,
            action_dim: 1,
            states: vec![0.0; 4],
            actions: vec![0.0; 4],
            old_log_probs,
            advantages: vec![1.0, -1.0, 0.5, 2.0],
            td_targets: vec![1.0, 0.0, 2.0, 1.0],
        }
    }

    fn evaluation(log_probs: Vec<f64>) -> Evaluation<HostTensor> {
        Evaluation {
            log_probs: HostTensor::new(log_probs),
            entropy: HostTensor::new(vec![0.7; 4]),
            values: HostTensor::new(vec![0.5, 0.0, 1.0, 1.0]),
        }
    }

    #[test]
    fn a2c_loss_matches_formula() {
        let lp = vec![-0.5, -1.0, -0.2, -2.0];
        let mb = minibatch(None);
        let out = a2c_loss(&evaluation(lp.clone()), &mb, COEFS);

        let policy = -(lp.iter().zip(&mb.advantages).map(|(l, a)| l * a).sum::<f64>() / 4.0);
        let value = (0.25 + 0.0 + 1.0 + 0.0) / 4.0;
        assert!((out.policy_loss - policy).abs() < 1e-12);
        assert!((out.value_loss - value).abs() < 1e-12);
        assert!((out.entropy - 0.7).abs() < 1e-12);
        let total = policy + 0.5 * value - 0.01 * 0.7;
        assert!((out.total.scalar() - total).abs() < 1e-12);
        assert!(out.diagnostics.is_none());
    }

    #[test]
    fn ppo_ratio_is_one_before_any_update() {
        let lp = vec![-0.5, -1.0, -0.2, -2.0];
        let mb = minibatch(Some(lp.clone()));
        let out = ppo_loss(&evaluation(lp), &mb, COEFS, 0.2).unwrap();

        let diag = out.diagnostics.unwrap();
        assert_eq!(diag.clip_fraction, 0.0);
        assert_eq!(diag.approx_kl, 0.0);
        assert_eq!(diag.old_approx_kl, 0.0);
        // ratio == 1, so the surrogate is just -mean(A).
        assert!((out.policy_loss + 2.5 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn ppo_clipping_binds_on_large_ratios() {
        let old = vec![0.0; 4];
        let new = vec![1.0f64.ln() + 0.5, 0.0, 0.0, 0.0];
        let mb = minibatch(Some(old));
        let out = ppo_loss(&evaluation(new), &mb, COEFS, 0.2).unwrap();

        // Row 0: ratio e^0.5 with A = 1 -> clipped to 1.2.
        let expected = -((1.2 * 1.0) + (-1.0) + 0.5 + 2.0) / 4.0;
        assert!((out.policy_loss - expected).abs() < 1e-12);
        assert_eq!(out.diagnostics.unwrap().clip_fraction, 0.25);
    }

    #[test]
    fn clip_fraction_zero_with_unbounded_eps() {
        let diag = PpoDiagnostics::from_log_ratios(&[3.0, -2.0, 0.5], f64::INFINITY);
        assert_eq!(diag.clip_fraction, 0.0);
    }

    #[test]
    fn clip_fraction_counts_rows_outside_band() {
        let log_ratios = [0.0, 0.3f64.ln_1p(), (-0.05f64).ln_1p(), (-0.5f64).ln_1p()];
        let diag = PpoDiagnostics::from_log_ratios(&log_ratios, 0.2);
        assert_eq!(diag.clip_fraction, 0.5);
    }

    #[test]
    fn ppo_without_old_log_probs_is_rejected() {
        let mb = minibatch(None);
        let err = ppo_loss(&evaluation(vec![0.0; 4]), &mb, COEFS, 0.2).unwrap_err();
        assert!(matches!(
            err,
            TrainError::ShapeMismatch {
                what: "old_log_probs",
                ..
            }
        ));
    }

    #[test]
    fn objective_dispatches_by_variant() {
        let lp = vec![-0.3; 4];
        let mb = minibatch(Some(lp.clone()));
        let ppo = Objective::Ppo {
            clip_eps: 0.2,
            num_optims: 1,
            num_minibatches: 1,
        };
        let a = ppo.compute_update(&evaluation(lp.clone()), &mb, COEFS).unwrap();
        let b = Objective::A2c
            .compute_update(&evaluation(lp), &mb, COEFS)
            .unwrap();
        assert!(a.diagnostics.is_some());
        assert!(b.diagnostics.is_none());
    }
}
