//! Error types for taskq operations.
//!
//! Defines the errors surfaced by the scheduler:
//! - Configuration values rejected by the setters or by text parsing
//! - Worker outcomes (retried failures and fatal contract violations)
//! - Environment-based configuration loading

use thiserror::Error;

use crate::scheduler::UnitKey;

/// Errors reported by the [`Scheduler`](crate::scheduler::Scheduler).
///
/// The type is `Clone` so it can be delivered on the broadcast event
/// channel as well as returned to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Concurrency must be a non-negative integer.
    #[error("Invalid integer provided for concurrency: {value}")]
    InvalidConcurrency { value: String },

    /// Group size must be a positive integer.
    #[error("Invalid integer provided for group size: {value}")]
    InvalidGroupSize { value: String },

    /// A boolean switch received something that is not a boolean.
    #[error("Invalid value for {key}: expected boolean, got '{value}'")]
    InvalidArgument { key: String, value: String },

    /// The worker broke its contract instead of returning an outcome.
    /// Fatal: the affected tasks are not retried.
    #[error("Non-error failure returned from worker for {unit}: {message}")]
    NonErrorFailure { unit: UnitKey, message: String },

    /// The worker reported an ordinary failure. Absorbed by the retry path.
    #[error("Worker failed for {unit}: {message}")]
    WorkerFailure { unit: UnitKey, message: String },

    /// Loading configuration from the environment failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SchedulerError {
    /// Returns whether this error must be escalated rather than retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::NonErrorFailure { .. })
    }
}

/// Errors that can occur while building a [`SchedulerConfig`](crate::scheduler::SchedulerConfig).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Convenience alias for scheduler results.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
