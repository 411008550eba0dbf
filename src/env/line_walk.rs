//! One-dimensional corridor walk.
//!
//! The agent starts at a random interior cell of a corridor of `length + 1`
//! cells and moves left (action 0) or right (action 1). Reaching the right
//! end pays `+1` and terminates; the left end is a wall. Every step costs a
//! small time penalty, and episodes are truncated after `max_steps`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Env, EnvStep};
use crate::error::BoxError;

/// Discrete corridor environment, seeded for reproducible episodes.
#[derive(Debug, Clone)]
pub struct LineWalk {
    length: usize,
    max_steps: usize,
    step_penalty: f64,
    position: usize,
    t: usize,
    rng: StdRng,
}

impl LineWalk {
    /// Reward for reaching the goal cell.
    pub const GOAL_REWARD: f64 = 1.0;

    /// Creates a corridor with `length + 1` cells.
    ///
    /// # Panics
    ///
    /// Panics if `length < 2` (no interior start cell).
    pub fn new(length: usize, max_steps: usize, seed: u64) -> Self {
        assert!(length >= 2, "corridor needs at least one interior cell");
        Self {
            length,
            max_steps,
            step_penalty: 0.01,
            position: length / 2,
            t: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Overrides the per-step time penalty.
    pub fn with_step_penalty(mut self, penalty: f64) -> Self {
        self.step_penalty = penalty;
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn observation(&self) -> Vec<f64> {
        // Position scaled to [-1, 1] and remaining time fraction.
        let x = 2.0 * self.position as f64 / self.length as f64 - 1.0;
        let time_left = 1.0 - self.t as f64 / self.max_steps.max(1) as f64;
        vec![x, time_left]
    }
}

impl Env for LineWalk {
    fn observation_dim(&self) -> usize {
        2
    }

    fn action_dim(&self) -> usize {
        1
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Vec<f64>, BoxError> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.position = self.rng.gen_range(1..self.length);
        self.t = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: &[f64]) -> Result<EnvStep, BoxError> {
        let choice = action.first().copied().ok_or("LineWalk expects one action value")?;
        match choice.round() as i64 {
            0 => self.position = self.position.saturating_sub(1),
            1 => self.position = (self.position + 1).min(self.length),
            other => return Err(format!("LineWalk action must be 0 or 1, got {other}").into()),
        }
        self.t += 1;

        let terminated = self.position == self.length;
        let truncated = !terminated && self.t >= self.max_steps;
        let reward = if terminated {
            Self::GOAL_REWARD
        } else {
            -self.step_penalty
        };

        Ok(EnvStep {
            observation: self.observation(),
            reward,
            terminated,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_starts_on_interior_cell() {
        let mut env = LineWalk::new(6, 20, 1);
        for seed in 0..20 {
            env.reset(Some(seed)).unwrap();
            assert!(env.position() >= 1 && env.position() < 6);
        }
    }

    #[test]
    fn walking_right_reaches_goal() {
        let mut env = LineWalk::new(4, 50, 0);
        env.reset(Some(3)).unwrap();
        let mut last = None;
        for _ in 0..4 {
            let step = env.step(&[1.0]).unwrap();
            if step.terminated {
                last = Some(step);
                break;
            }
        }
        let last = last.expect("goal reached within the corridor length");
        assert_eq!(last.reward, LineWalk::GOAL_REWARD);
        assert!(!last.truncated);
    }

    #[test]
    fn time_limit_truncates() {
        let mut env = LineWalk::new(10, 3, 0);
        env.reset(Some(0)).unwrap();
        let steps: Vec<_> = (0..3).map(|_| env.step(&[0.0]).unwrap()).collect();
        assert!(!steps[1].truncated);
        assert!(steps[2].truncated);
        assert!(steps.iter().all(|s| !s.terminated));
    }

    #[test]
    fn invalid_action_is_an_error() {
        let mut env = LineWalk::new(4, 10, 0);
        env.reset(None).unwrap();
        assert!(env.step(&[3.0]).is_err());
        assert!(env.step(&[]).is_err());
    }

    #[test]
    fn same_seed_same_start() {
        let mut a = LineWalk::new(8, 10, 0);
        let mut b = LineWalk::new(8, 10, 99);
        assert_eq!(a.reset(Some(5)).unwrap(), b.reset(Some(5)).unwrap());
    }
}
