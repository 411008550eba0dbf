//! Scalar metric sinks and the explicit training counters.

use std::collections::HashMap;
use std::fmt;

use crate::env::EpisodeStats;

/// Metric names written by the training pipeline.
pub mod names {
    pub const EPISODIC_RETURN: &str = "rollout/episodic_return";
    pub const EPISODIC_LENGTH: &str = "rollout/episodic_length";
    pub const SPS: &str = "rollout/sps";
    pub const LEARNING_RATE: &str = "charts/learning_rate";
    pub const LOSS: &str = "update/loss";
    pub const POLICY_LOSS: &str = "update/policy_loss";
    pub const VALUE_LOSS: &str = "update/value_loss";
    pub const ENTROPY: &str = "update/entropy";
    pub const OLD_APPROX_KL: &str = "debug/old_approx_kl";
    pub const APPROX_KL: &str = "debug/approx_kl";
    pub const CLIP_FRACTION: &str = "debug/clipfrac";
}

/// Receiver for scalar time series tagged with the global step.
pub trait MetricsSink {
    fn record_scalar(&mut self, name: &str, value: f64, step: u64);
}

impl<M: MetricsSink + ?Sized> MetricsSink for &mut M {
    fn record_scalar(&mut self, name: &str, value: f64, step: u64) {
        (**self).record_scalar(name, value, step);
    }
}

/// Keeps every recorded point in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    series: HashMap<String, Vec<(u64, f64)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(step, value)` points recorded under `name`.
    pub fn series(&self, name: &str) -> &[(u64, f64)] {
        self.series.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Most recent value recorded under `name`.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.series(name).last().map(|&(_, v)| v)
    }

    /// Names that have at least one point.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl MetricsSink for MemorySink {
    fn record_scalar(&mut self, name: &str, value: f64, step: u64) {
        self.series
            .entry(name.to_string())
            .or_default()
            .push((step, value));
    }
}

/// Writes every scalar through the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn record_scalar(&mut self, name: &str, value: f64, step: u64) {
        log::debug!(target: "rollout_rl::metrics", "step={step} {name}={value:.6}");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record_scalar(&mut self, _name: &str, _value: f64, _step: u64) {}
}

/// Run-wide counters, threaded explicitly through the training loop.
///
/// The episode histories hold one entry per finished episode and are never
/// trimmed, so they grow with the run. [`TrainingState::summary`] averages a
/// fraction of the whole history and needs all of it.
#[derive(Debug, Default, Clone)]
pub struct TrainingState {
    /// Environment steps taken, summed over lanes.
    pub global_step: u64,
    /// Completed update iterations.
    pub updates: usize,
    /// Return of every finished episode, in completion order. Unbounded.
    pub episode_returns: Vec<f64>,
    /// Length of every finished episode, in completion order. Unbounded.
    pub episode_lengths: Vec<usize>,
}

impl TrainingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished episode.
    pub fn push_episode(&mut self, stats: EpisodeStats) {
        self.episode_returns.push(stats.episodic_return);
        self.episode_lengths.push(stats.length);
    }

    /// Episodes finished since the run started.
    pub fn episodes(&self) -> usize {
        self.episode_returns.len()
    }

    /// Mean return of the last `n` episodes, `None` before the first one ends.
    pub fn recent_mean_return(&self, n: usize) -> Option<f64> {
        let tail = tail(&self.episode_returns, n);
        (!tail.is_empty()).then(|| tail.iter().sum::<f64>() / tail.len() as f64)
    }

    /// Snapshot of the run.
    pub fn summary(&self) -> TrainingSummary {
        let count = (self.episode_returns.len() / 20).max(1);
        TrainingSummary {
            global_step: self.global_step,
            updates: self.updates,
            episodes: self.episodes(),
            mean_train_return: self.recent_mean_return(count),
        }
    }
}

/// End-of-run report.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub global_step: u64,
    pub updates: usize,
    pub episodes: usize,
    /// Mean return over the final 5% of episodes (at least one).
    pub mean_train_return: Option<f64>,
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Training Summary ===")?;
        writeln!(f, "  Global steps:       {}", self.global_step)?;
        writeln!(f, "  Updates:            {}", self.updates)?;
        writeln!(f, "  Episodes:           {}", self.episodes)?;
        match self.mean_train_return {
            Some(r) => writeln!(f, "  Mean train return:  {:.3}", r),
            None => writeln!(f, "  Mean train return:  n/a"),
        }
    }
}

fn tail<T>(values: &[T], n: usize) -> &[T] {
    &values[values.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_series() {
        let mut sink = MemorySink::new();
        sink.record_scalar("a", 1.0, 10);
        sink.record_scalar("a", 2.0, 20);
        sink.record_scalar("b", 5.0, 20);
        assert_eq!(sink.series("a"), &[(10, 1.0), (20, 2.0)]);
        assert_eq!(sink.last("b"), Some(5.0));
        assert!(sink.series("missing").is_empty());
    }

    #[test]
    fn mutable_reference_is_a_sink() {
        fn record(mut sink: impl MetricsSink) {
            sink.record_scalar("x", 1.0, 0);
        }
        let mut sink = MemorySink::new();
        record(&mut sink);
        assert_eq!(sink.last("x"), Some(1.0));
    }

    #[test]
    fn summary_uses_last_five_percent() {
        let mut state = TrainingState::new();
        for i in 0..40 {
            state.push_episode(EpisodeStats {
                episodic_return: i as f64,
                length: 1,
            });
        }
        // 5% of 40 episodes = 2 -> mean of 38 and 39.
        assert_eq!(state.summary().mean_train_return, Some(38.5));
    }

    #[test]
    fn summary_without_episodes() {
        let state = TrainingState::new();
        let summary = state.summary();
        assert_eq!(summary.mean_train_return, None);
        assert!(summary.to_string().contains("n/a"));
    }

    #[test]
    fn history_keeps_every_episode() {
        let mut state = TrainingState::new();
        for i in 0..1000 {
            state.push_episode(EpisodeStats {
                episodic_return: 1.0,
                length: i,
            });
        }
        assert_eq!(state.episodes(), 1000);
        assert_eq!(state.episode_lengths.first(), Some(&0));
        assert_eq!(state.episode_lengths.len(), 1000);
        // 5% of 1000 episodes = 50.
        assert_eq!(state.recent_mean_return(50), state.summary().mean_train_return);
    }
}
