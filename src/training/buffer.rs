//! Fixed-horizon trajectory storage for one rollout.
//!
//! Every field is a flat row-major array of shape `[num_steps, num_envs, ...]`.
//! A push writes one time-step column for all lanes at once and advances the
//! cursor modulo the horizon.

/// One time step across all lanes, borrowed from the rollout driver.
#[derive(Debug, Clone, Copy)]
pub struct StepRecord<'a> {
    /// Observations that the actions were taken in, `[num_envs, obs_dim]`.
    pub states: &'a [f64],
    /// Actions taken, `[num_envs, action_dim]`.
    pub actions: &'a [f64],
    /// Rewards received, `[num_envs]`.
    pub rewards: &'a [f64],
    /// Continuation mask, `[num_envs]`: 0.0 where the episode ended.
    pub continuation: &'a [f64],
    /// Behaviour-policy log-probabilities, `[num_envs]`. Absent for A2C.
    pub log_probs: Option<&'a [f64]>,
    /// Critic value estimates, `[num_envs]`.
    pub values: &'a [f64],
}

/// Read-only view over a stored rollout.
#[derive(Debug, Clone, Copy)]
pub struct Trajectory<'a> {
    /// Rollout horizon (rows of every table).
    pub num_steps: usize,
    /// Parallel lanes (columns of every table).
    pub num_envs: usize,
    /// Values per observation.
    pub obs_dim: usize,
    /// Values per action.
    pub action_dim: usize,
    /// Observations, `num_steps × num_envs × obs_dim`.
    pub states: &'a [f64],
    /// Actions taken, `num_steps × num_envs × action_dim`.
    pub actions: &'a [f64],
    /// Rewards received after each action.
    pub rewards: &'a [f64],
    /// 1.0 while the episode continues past the step, 0.0 when it ended.
    pub continuation: &'a [f64],
    /// Behaviour-policy log-probabilities, if the store tracks them.
    pub log_probs: Option<&'a [f64]>,
    /// Critic estimates at collection time.
    pub values: &'a [f64],
}

impl Trajectory<'_> {
    /// Number of transitions (`num_steps × num_envs`).
    pub fn len(&self) -> usize {
        self.num_steps * self.num_envs
    }

    /// Returns true if the trajectory holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ring-indexed storage for `num_steps × num_envs` transitions.
#[derive(Debug, Clone)]
pub struct TrajectoryStore {
    num_steps: usize,
    num_envs: usize,
    obs_dim: usize,
    action_dim: usize,
    states: Vec<f64>,
    actions: Vec<f64>,
    rewards: Vec<f64>,
    continuation: Vec<f64>,
    log_probs: Option<Vec<f64>>,
    values: Vec<f64>,
    cursor: usize,
    written: usize,
}

impl TrajectoryStore {
    /// Creates a zero-filled store.
    ///
    /// # Arguments
    ///
    /// * `num_steps` - Horizon (ring capacity)
    /// * `num_envs` - Number of parallel lanes
    /// * `obs_dim` - Flattened observation width
    /// * `action_dim` - Flattened action width (1 for discrete actions)
    /// * `track_log_probs` - Whether to allocate the log-probability table
    pub fn new(
        num_steps: usize,
        num_envs: usize,
        obs_dim: usize,
        action_dim: usize,
        track_log_probs: bool,
    ) -> Self {
        let cells = num_steps * num_envs;
        Self {
            num_steps,
            num_envs,
            obs_dim,
            action_dim,
            states: vec![0.0; cells * obs_dim],
            actions: vec![0.0; cells * action_dim],
            rewards: vec![0.0; cells],
            continuation: vec![0.0; cells],
            log_probs: track_log_probs.then(|| vec![0.0; cells]),
            values: vec![0.0; cells],
            cursor: 0,
            written: 0,
        }
    }

    /// Writes one time-step column at the cursor and advances it.
    ///
    /// # Panics
    ///
    /// Panics if a field's length does not match the lane count, or if the
    /// presence of log-probabilities disagrees with how the store was built.
    pub fn push(&mut self, record: StepRecord<'_>) {
        let n = self.num_envs;
        assert_eq!(record.states.len(), n * self.obs_dim, "states width");
        assert_eq!(record.actions.len(), n * self.action_dim, "actions width");
        assert_eq!(record.rewards.len(), n, "rewards width");
        assert_eq!(record.continuation.len(), n, "continuation width");
        assert_eq!(record.values.len(), n, "values width");

        let t = self.cursor;
        write_column(&mut self.states, t, n * self.obs_dim, record.states);
        write_column(&mut self.actions, t, n * self.action_dim, record.actions);
        write_column(&mut self.rewards, t, n, record.rewards);
        write_column(&mut self.continuation, t, n, record.continuation);
        write_column(&mut self.values, t, n, record.values);
        match (self.log_probs.as_mut(), record.log_probs) {
            (Some(table), Some(column)) => {
                assert_eq!(column.len(), n, "log_probs width");
                write_column(table, t, n, column);
            }
            (None, None) => {}
            (Some(_), None) => panic!("store tracks log-probabilities but none were pushed"),
            (None, Some(_)) => panic!("log-probabilities pushed into a store without a table"),
        }

        self.cursor = (self.cursor + 1) % self.num_steps;
        self.written += 1;
    }

    /// Returns the full stacked arrays.
    ///
    /// Contents are only meaningful once [`is_full`](Self::is_full) holds.
    pub fn get(&self) -> Trajectory<'_> {
        Trajectory {
            num_steps: self.num_steps,
            num_envs: self.num_envs,
            obs_dim: self.obs_dim,
            action_dim: self.action_dim,
            states: &self.states,
            actions: &self.actions,
            rewards: &self.rewards,
            continuation: &self.continuation,
            log_probs: self.log_probs.as_deref(),
            values: &self.values,
        }
    }

    /// True once at least one full horizon has been written since the last reset.
    pub fn is_full(&self) -> bool {
        self.written >= self.num_steps
    }

    /// Next time-step index to be written.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rewinds the cursor for a new rollout. Stored values are overwritten lazily.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.written = 0;
    }

    /// Rollout horizon.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Number of lanes per step.
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Whether pushes must carry log-probabilities.
    pub fn tracks_log_probs(&self) -> bool {
        self.log_probs.is_some()
    }
}

fn write_column(table: &mut [f64], t: usize, width: usize, column: &[f64]) {
    table[t * width..(t + 1) * width].copy_from_slice(column);
}
