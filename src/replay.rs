//! Off-policy building blocks: replay buffer, soft target updates, and the
//! epsilon-greedy exploration schedule.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::error::TrainError;

/// One stored environment transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f64>,
    pub action: Vec<f64>,
    pub reward: f64,
    pub next_state: Vec<f64>,
    /// 1 while the episode continues, 0 at a terminal step.
    pub continuation: f64,
}

/// Bounded FIFO of transitions with uniform sampling.
///
/// Once full, each push evicts the oldest transition.
#[derive(Debug)]
pub struct ReplayBuffer {
    capacity: usize,
    items: VecDeque<Transition>,
    rng: StdRng,
}

impl ReplayBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, seed: u64) -> Self {
        assert!(capacity > 0, "replay capacity must be positive");
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Draws `batch_size` distinct transitions uniformly at random.
    ///
    /// Returns `None` while fewer than `batch_size` transitions are stored.
    pub fn sample(&mut self, batch_size: usize) -> Option<Vec<&Transition>> {
        if batch_size > self.items.len() {
            return None;
        }
        let picks = index::sample(&mut self.rng, self.items.len(), batch_size);
        Some(picks.into_iter().map(|i| &self.items[i]).collect())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// `target = τ·source + (1−τ)·target`, elementwise.
pub fn soft_update(target: &mut [f64], source: &[f64], tau: f64) -> Result<(), TrainError> {
    TrainError::check_len("soft update source", target.len(), source.len())?;
    for (t, &s) in target.iter_mut().zip(source) {
        *t = tau * s + (1.0 - tau) * *t;
    }
    Ok(())
}

/// Exponentially decaying epsilon-greedy exploration probability.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExplorationSchedule {
    pub start: f64,
    pub end: f64,
    /// Steps per e-fold of decay.
    pub decay: f64,
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self {
            start: 1.0,
            end: 0.05,
            decay: 10_000.0,
        }
    }
}

impl ExplorationSchedule {
    /// `end + (start − end)·exp(−step/decay)`
    pub fn prob(&self, step: u64) -> f64 {
        self.end + (self.start - self.end) * (-(step as f64) / self.decay).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(tag: f64) -> Transition {
        Transition {
            state: vec![tag],
            action: vec![0.0],
            reward: tag,
            next_state: vec![tag + 1.0],
            continuation: 1.0,
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut buffer = ReplayBuffer::new(3, 0);
        for i in 0..5 {
            buffer.push(transition(i as f64));
        }
        assert_eq!(buffer.len(), 3);
        let mut rewards: Vec<f64> = buffer.sample(3).unwrap().iter().map(|t| t.reward).collect();
        rewards.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn sample_draws_distinct_rows() {
        let mut buffer = ReplayBuffer::new(100, 7);
        for i in 0..50 {
            buffer.push(transition(i as f64));
        }
        let mut rewards: Vec<f64> = buffer.sample(20).unwrap().iter().map(|t| t.reward).collect();
        rewards.sort_by(|a, b| a.partial_cmp(b).unwrap());
        rewards.dedup();
        assert_eq!(rewards.len(), 20);
    }

    #[test]
    fn sample_needs_enough_transitions() {
        let mut buffer = ReplayBuffer::new(10, 0);
        buffer.push(transition(0.0));
        assert!(buffer.sample(2).is_none());
        assert_eq!(buffer.sample(1).unwrap().len(), 1);
    }

    #[test]
    fn soft_update_blends() {
        let mut target = vec![0.0, 10.0];
        soft_update(&mut target, &[1.0, 0.0], 0.1).unwrap();
        assert!((target[0] - 0.1).abs() < 1e-12);
        assert!((target[1] - 9.0).abs() < 1e-12);

        soft_update(&mut target, &[5.0, 5.0], 1.0).unwrap();
        assert_eq!(target, vec![5.0, 5.0]);
        assert!(soft_update(&mut target, &[1.0], 0.5).is_err());
    }

    #[test]
    fn exploration_decays_towards_end() {
        let schedule = ExplorationSchedule::default();
        assert_eq!(schedule.prob(0), 1.0);
        let e1 = (-1.0f64).exp();
        assert!((schedule.prob(10_000) - (0.05 + 0.95 * e1)).abs() < 1e-12);
        assert!((schedule.prob(1_000_000) - 0.05).abs() < 1e-12);
    }
}
