use thiserror::Error;

/// Reasons a [`Config`](crate::config::Config) is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("retire threshold must be at least 1")]
    ZeroRetireThreshold,
    #[error("max back-off of {requested} spins exceeds the limit of {limit}")]
    BackoffTooLarge { requested: u32, limit: u32 },
}

#[derive(Debug, Error)]
pub enum TesterError {
    #[error("could not start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
