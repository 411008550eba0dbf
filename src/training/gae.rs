//! Generalized Advantage Estimation (GAE-λ).
//!
//! Backward recurrence over a `[num_steps, num_envs]` rollout. The mask fed
//! in is a *continuation* mask: 1.0 while the episode goes on past step `t`,
//! 0.0 on the episode's final transition.

/// Per-step advantages and value targets, both `[num_steps, num_envs]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Advantages {
    pub advantages: Vec<f64>,
    /// `advantage + value_estimate`, elementwise.
    pub td_targets: Vec<f64>,
}

/// Computes GAE-λ advantages and value targets for every lane.
///
/// The time loop runs strictly from the last step to the first; results
/// depend on that order under floating-point arithmetic.
///
/// # Arguments
///
/// * `rewards` - Rewards, `[num_steps, num_envs]` row-major
/// * `values` - Critic estimates for the visited states, same layout
/// * `continuation` - Continuation mask, same layout
/// * `bootstrap` - Critic estimate of the state after the last step, `[num_envs]`
/// * `gamma` - Discount factor
/// * `gae_lambda` - Trace decay (0 = one-step TD, 1 = Monte Carlo)
///
/// # Panics
///
/// Panics if the table lengths are not multiples of `bootstrap.len()`.
pub fn compute_gae(
    rewards: &[f64],
    values: &[f64],
    continuation: &[f64],
    bootstrap: &[f64],
    gamma: f64,
    gae_lambda: f64,
) -> Advantages {
    let num_envs = bootstrap.len();
    let n = rewards.len();
    assert_eq!(values.len(), n);
    assert_eq!(continuation.len(), n);
    assert!(num_envs > 0 && n % num_envs == 0, "tables must be [T, num_envs]");
    let num_steps = n / num_envs;

    let mut advantages = vec![0.0; n];
    let mut running = vec![0.0; num_envs];
    let mut last_value = bootstrap.to_vec();

    for t in (0..num_steps).rev() {
        let row = t * num_envs;
        for env in 0..num_envs {
            let i = row + env;
            let mask = continuation[i];
            let target = rewards[i] + gamma * last_value[env] * mask;
            let delta = target - values[i];
            running[env] = delta + gamma * gae_lambda * mask * running[env];
            advantages[i] = running[env];
            last_value[env] = values[i];
        }
    }

    let td_targets = advantages
        .iter()
        .zip(values.iter())
        .map(|(a, v)| a + v)
        .collect();

    Advantages {
        advantages,
        td_targets,
    }
}
