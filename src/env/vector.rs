//! Sequential vectorization of single-instance environments.

use super::{Env, EpisodeStats, VecEnv, VecStep};
use crate::error::BoxError;

/// Steps each lane in turn, auto-resets finished lanes, and records episode
/// return and length.
#[derive(Debug)]
pub struct SyncVecEnv<E> {
    envs: Vec<E>,
    episode_returns: Vec<f64>,
    episode_lengths: Vec<usize>,
}

impl<E: Env> SyncVecEnv<E> {
    /// Wraps the given lanes.
    ///
    /// # Panics
    ///
    /// Panics if `envs` is empty or the lanes disagree on their dimensions.
    pub fn new(envs: Vec<E>) -> Self {
        assert!(!envs.is_empty(), "SyncVecEnv needs at least one lane");
        let (obs_dim, action_dim) = (envs[0].observation_dim(), envs[0].action_dim());
        assert!(
            envs.iter()
                .all(|e| e.observation_dim() == obs_dim && e.action_dim() == action_dim),
            "all lanes must share observation and action dimensions"
        );
        let n = envs.len();
        Self {
            envs,
            episode_returns: vec![0.0; n],
            episode_lengths: vec![0; n],
        }
    }

    /// Builds `num_envs` lanes with `make(lane_index)`.
    pub fn from_fn(num_envs: usize, make: impl FnMut(usize) -> E) -> Self {
        Self::new((0..num_envs).map(make).collect())
    }

    /// Returns the wrapped lanes.
    pub fn envs(&self) -> &[E] {
        &self.envs
    }
}

impl<E: Env> VecEnv for SyncVecEnv<E> {
    fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn observation_dim(&self) -> usize {
        self.envs[0].observation_dim()
    }

    fn action_dim(&self) -> usize {
        self.envs[0].action_dim()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Vec<f64>, BoxError> {
        let mut states = Vec::with_capacity(self.envs.len() * self.observation_dim());
        for (lane, env) in self.envs.iter_mut().enumerate() {
            // Lanes get consecutive seeds, wrapping at u64::MAX.
            states.extend(env.reset(seed.map(|s| s.wrapping_add(lane as u64)))?);
        }
        self.episode_returns.iter_mut().for_each(|r| *r = 0.0);
        self.episode_lengths.iter_mut().for_each(|l| *l = 0);
        Ok(states)
    }

    fn step(&mut self, actions: &[f64]) -> Result<VecStep, BoxError> {
        let n = self.envs.len();
        let action_dim = self.action_dim();
        if actions.len() != n * action_dim {
            return Err(format!(
                "expected {} action values for {} lanes, got {}",
                n * action_dim,
                n,
                actions.len()
            )
            .into());
        }

        let mut out = VecStep {
            next_states: Vec::with_capacity(n * self.observation_dim()),
            rewards: Vec::with_capacity(n),
            terminated: Vec::with_capacity(n),
            truncated: Vec::with_capacity(n),
            final_episodes: Vec::with_capacity(n),
        };

        for (lane, env) in self.envs.iter_mut().enumerate() {
            let action = &actions[lane * action_dim..(lane + 1) * action_dim];
            let step = env.step(action)?;

            self.episode_returns[lane] += step.reward;
            self.episode_lengths[lane] += 1;

            let observation = if step.terminated || step.truncated {
                out.final_episodes.push(Some(EpisodeStats {
                    episodic_return: self.episode_returns[lane],
                    length: self.episode_lengths[lane],
                }));
                self.episode_returns[lane] = 0.0;
                self.episode_lengths[lane] = 0;
                env.reset(None)?
            } else {
                out.final_episodes.push(None);
                step.observation
            };

            out.next_states.extend(observation);
            out.rewards.push(step.reward);
            out.terminated.push(step.terminated);
            out.truncated.push(step.truncated);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvStep;

    /// Counts steps and terminates after `len` of them.
    struct Countdown {
        len: usize,
        t: usize,
        resets: usize,
        seeds: Vec<Option<u64>>,
    }

    impl Env for Countdown {
        fn observation_dim(&self) -> usize {
            1
        }

        fn action_dim(&self) -> usize {
            1
        }

        fn reset(&mut self, seed: Option<u64>) -> Result<Vec<f64>, BoxError> {
            self.t = 0;
            self.resets += 1;
            self.seeds.push(seed);
            Ok(vec![0.0])
        }

        fn step(&mut self, action: &[f64]) -> Result<EnvStep, BoxError> {
            self.t += 1;
            Ok(EnvStep {
                observation: vec![self.t as f64],
                reward: action[0],
                terminated: self.t == self.len,
                truncated: false,
            })
        }
    }

    fn countdowns(lens: &[usize]) -> SyncVecEnv<Countdown> {
        SyncVecEnv::new(
            lens.iter()
                .map(|&len| Countdown {
                    len,
                    t: 0,
                    resets: 0,
                    seeds: Vec::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn finished_lane_is_auto_reset_with_stats() {
        let mut env = countdowns(&[1, 3]);
        env.reset(Some(0)).unwrap();
        let step = env.step(&[2.0, 0.5]).unwrap();

        assert_eq!(step.terminated, vec![true, false]);
        assert_eq!(
            step.final_episodes[0],
            Some(EpisodeStats {
                episodic_return: 2.0,
                length: 1
            })
        );
        assert_eq!(step.final_episodes[1], None);
        // Lane 0 already shows the next episode's first observation.
        assert_eq!(step.next_states, vec![0.0, 1.0]);
        assert_eq!(env.envs()[0].resets, 2);
    }

    #[test]
    fn returns_accumulate_across_steps() {
        let mut env = countdowns(&[3]);
        env.reset(None).unwrap();
        env.step(&[1.0]).unwrap();
        env.step(&[1.0]).unwrap();
        let step = env.step(&[1.5]).unwrap();
        assert_eq!(
            step.final_episodes[0],
            Some(EpisodeStats {
                episodic_return: 3.5,
                length: 3
            })
        );
    }

    #[test]
    fn wrong_action_count_is_an_error() {
        let mut env = countdowns(&[2, 2]);
        env.reset(None).unwrap();
        assert!(env.step(&[1.0]).is_err());
    }

    #[test]
    fn lane_seeds_are_consecutive() {
        let mut env = countdowns(&[2, 2, 2]);
        env.reset(Some(7)).unwrap();
        let seeds: Vec<_> = env.envs().iter().map(|e| e.seeds.clone()).collect();
        assert_eq!(seeds, vec![vec![Some(7)], vec![Some(8)], vec![Some(9)]]);
    }

    #[test]
    fn reset_with_max_seed_wraps() {
        let mut env = countdowns(&[2, 2]);
        let states = env.reset(Some(u64::MAX)).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(env.envs()[0].seeds, vec![Some(u64::MAX)]);
        assert_eq!(env.envs()[1].seeds, vec![Some(0)]);
    }
}
