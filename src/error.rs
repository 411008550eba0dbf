use thiserror::Error;

/// Boxed error returned by external collaborators (environment, policy port).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid training configuration, detected before any rollout begins.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Rollout horizon must be at least one step")]
    ZeroHorizon,

    #[error("At least one environment lane is required")]
    ZeroLanes,

    #[error("Batch size {batch_size} is not divisible by {num_minibatches} minibatches")]
    IndivisibleBatch {
        batch_size: usize,
        num_minibatches: usize,
    },

    #[error("Number of minibatches must be at least one")]
    ZeroMinibatches,

    #[error("Number of optimization epochs must be at least one")]
    ZeroEpochs,

    #[error("Total timesteps {total_timesteps} is smaller than one batch of {batch_size}")]
    TooFewTimesteps {
        total_timesteps: usize,
        batch_size: usize,
    },

    #[error("Parameter `{name}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Parameter `{name}` must be strictly positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

/// Fatal failure of a training run.
///
/// Nothing here is retried: a trajectory is either fully collected and
/// consumed, or the iteration is abandoned and the error surfaces.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Non-finite advantage at batch index {index} after normalization")]
    NonFiniteAdvantage { index: usize },

    #[error("Non-finite loss {value} at epoch {epoch}, minibatch {minibatch}")]
    NonFiniteLoss {
        epoch: usize,
        minibatch: usize,
        value: f64,
    },

    #[error("Shape mismatch for {what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Environment collaborator failed: {0}")]
    Environment(#[source] BoxError),

    #[error("Policy collaborator failed: {0}")]
    Policy(#[source] BoxError),
}

impl TrainError {
    /// Fails with [`TrainError::ShapeMismatch`] unless `actual == expected`.
    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(TrainError::ShapeMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}
