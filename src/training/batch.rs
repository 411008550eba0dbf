//! Flattened training batch and minibatch partitioning.

use rand::seq::SliceRandom;
use rand::Rng;

use super::buffer::Trajectory;
use super::gae::Advantages;
use crate::error::TrainError;

/// Stabilizer added to the advantage standard deviation.
pub const ADVANTAGE_EPS: f64 = 1e-8;

/// Flattened `(time × env)` view of one rollout plus its advantages.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub obs_dim: usize,
    pub action_dim: usize,
    /// `[len, obs_dim]`
    pub states: Vec<f64>,
    /// `[len, action_dim]`
    pub actions: Vec<f64>,
    /// Behaviour-policy log-probabilities; absent for A2C rollouts.
    pub old_log_probs: Option<Vec<f64>>,
    pub advantages: Vec<f64>,
    pub td_targets: Vec<f64>,
}

impl Batch {
    /// Flattens a completed trajectory together with its advantage table.
    pub fn from_trajectory(trajectory: &Trajectory<'_>, advantages: Advantages) -> Self {
        assert_eq!(advantages.advantages.len(), trajectory.len());
        assert_eq!(advantages.td_targets.len(), trajectory.len());
        Self {
            obs_dim: trajectory.obs_dim,
            action_dim: trajectory.action_dim,
            states: trajectory.states.to_vec(),
            actions: trajectory.actions.to_vec(),
            old_log_probs: trajectory.log_probs.map(<[f64]>::to_vec),
            advantages: advantages.advantages,
            td_targets: advantages.td_targets,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.advantages.len()
    }

    /// Returns true if the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.advantages.is_empty()
    }

    /// Normalizes the advantage column in place. See [`normalize_advantages`].
    pub fn normalize_advantages(&mut self) {
        normalize_advantages(&mut self.advantages);
    }

    /// Fails on the first non-finite advantage.
    pub fn ensure_finite_advantages(&self) -> Result<(), TrainError> {
        match self.advantages.iter().position(|a| !a.is_finite()) {
            Some(index) => Err(TrainError::NonFiniteAdvantage { index }),
            None => Ok(()),
        }
    }

    /// Gathers the given rows into a new batch.
    pub fn select(&self, indices: &[usize]) -> Batch {
        Batch {
            obs_dim: self.obs_dim,
            action_dim: self.action_dim,
            states: gather_rows(&self.states, self.obs_dim, indices),
            actions: gather_rows(&self.actions, self.action_dim, indices),
            old_log_probs: self
                .old_log_probs
                .as_ref()
                .map(|lp| gather_rows(lp, 1, indices)),
            advantages: gather_rows(&self.advantages, 1, indices),
            td_targets: gather_rows(&self.td_targets, 1, indices),
        }
    }
}

/// Normalizes to zero mean and unit variance: `(a − mean) / (std + ε)`.
///
/// Uses the population standard deviation. Statistics are local to the call.
pub fn normalize_advantages(advantages: &mut [f64]) {
    if advantages.is_empty() {
        return;
    }
    let n = advantages.len() as f64;
    let mean = advantages.iter().sum::<f64>() / n;
    let var = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt() + ADVANTAGE_EPS;
    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}

/// Draws a fresh uniform permutation of `0..batch_size` and cuts it into
/// contiguous minibatches of `minibatch_size` indices.
///
/// A trailing partial minibatch is kept when `minibatch_size` does not divide
/// `batch_size`; validated configurations never produce one.
pub fn shuffled_minibatches<R: Rng + ?Sized>(
    batch_size: usize,
    minibatch_size: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..batch_size).collect();
    indices.shuffle(rng);
    indices
        .chunks(minibatch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

fn gather_rows(table: &[f64], width: usize, indices: &[usize]) -> Vec<f64> {
    let mut out = Vec::with_capacity(indices.len() * width);
    for &i in indices {
        out.extend_from_slice(&table[i * width..(i + 1) * width]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_batch() -> Batch {
        Batch {
            obs_dim: 2,
            action_dim: 1,
            states: vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5],
            actions: vec![0.0, 1.0, 2.0],
            old_log_probs: Some(vec![-0.1, -0.2, -0.3]),
            advantages: vec![1.0, 2.0, 3.0],
            td_targets: vec![10.0, 20.0, 30.0],
        }
    }

    #[test]
    fn normalized_advantages_have_zero_mean_unit_std() {
        let mut adv = vec![1.0, 2.0, 3.0, 10.0, -4.0];
        normalize_advantages(&mut adv);
        let n = adv.len() as f64;
        let mean = adv.iter().sum::<f64>() / n;
        let std = (adv.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert!(mean.abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_batch_normalizes_to_zero() {
        let mut adv = vec![3.0; 4];
        normalize_advantages(&mut adv);
        assert!(adv.iter().all(|a| *a == 0.0));
    }

    #[test]
    fn non_finite_advantage_is_reported() {
        let mut batch = sample_batch();
        batch.advantages[1] = f64::NAN;
        assert!(matches!(
            batch.ensure_finite_advantages(),
            Err(TrainError::NonFiniteAdvantage { index: 1 })
        ));
    }

    #[test]
    fn select_gathers_rows() {
        let mb = sample_batch().select(&[2, 0]);
        assert_eq!(mb.states, vec![2.0, 2.5, 0.0, 0.5]);
        assert_eq!(mb.actions, vec![2.0, 0.0]);
        assert_eq!(mb.old_log_probs, Some(vec![-0.3, -0.1]));
        assert_eq!(mb.advantages, vec![3.0, 1.0]);
        assert_eq!(mb.td_targets, vec![30.0, 10.0]);
    }

    #[test]
    fn minibatches_partition_the_batch() {
        let mut rng = StdRng::seed_from_u64(7);
        let parts = shuffled_minibatches(8, 4, &mut rng);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.len() == 4));

        let mut seen: Vec<usize> = parts.concat();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn each_call_draws_a_new_permutation() {
        let mut rng = StdRng::seed_from_u64(3);
        let draws: Vec<Vec<usize>> = (0..5)
            .map(|_| shuffled_minibatches(64, 64, &mut rng).concat())
            .collect();
        assert!(draws.windows(2).any(|w| w[0] != w[1]));
    }
}
