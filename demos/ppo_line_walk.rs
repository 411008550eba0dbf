//! Trains PPO on the corridor walk with a tch actor-critic.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=info cargo run --example ppo_line_walk --features rl-nn
//! ```

use rollout_rl::env::{Env, LineWalk, SyncVecEnv};
use rollout_rl::metrics::LogSink;
use rollout_rl::nn::{ActionHead, TchPolicy};
use rollout_rl::{Objective, Trainer, TrainingConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TrainingConfig {
        total_timesteps: 100_000,
        num_envs: 8,
        num_steps: 128,
        objective: Objective::Ppo {
            clip_eps: 0.2,
            num_optims: 4,
            num_minibatches: 4,
        },
        learning_rate: 2.5e-4,
        seed: 1,
        ..TrainingConfig::default()
    };
    tch::manual_seed(config.seed as i64);

    // ── Environment: 8 corridors of 10 cells, seeded per lane ─────────
    let env = SyncVecEnv::from_fn(config.num_envs, |lane| {
        LineWalk::new(10, 50, config.seed + lane as u64)
    });
    let obs_dim = env.envs()[0].observation_dim();

    // ── Policy ───────────────────────────────────────────────────────
    let policy = TchPolicy::new(
        obs_dim,
        ActionHead::Categorical { num_actions: 2 },
        &config,
        tch::Device::cuda_if_available(),
    )?;

    let mut trainer = Trainer::new(config, env, policy, LogSink)?;
    let summary = trainer.train()?;

    println!("{summary}");
    Ok(())
}
