use thiserror::Error;

/// Errors that can occur within the timer pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The provided schedule definition is invalid (e.g. a zero-period
    /// repeating schedule, which would spin the worker).
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The worker task terminated abnormally (panicked or was cancelled
    /// out from under the pool).
    #[error("Worker task failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;
