//! Error types for stat registration and evaluation

use std::time::Duration;
use thiserror::Error;

/// Result type for registry operations
pub type StatResult<T> = Result<T, StatError>;

/// Errors raised by the stat registry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatError {
    /// Malformed registration call
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Binding references a stat that has no producer
    #[error("stat '{0}' must be registered before an action can be bound to it")]
    UnknownStat(String),

    /// The stat's producer returned an error or panicked
    #[error("producer for stat '{stat}' failed: {reason}")]
    ProducerFailure { stat: String, reason: String },

    /// A bound action ran and reported failure
    #[error("action '{action}' bound to stat '{stat}' failed: {reason}")]
    ActionFailure {
        stat: String,
        action: String,
        reason: String,
    },

    /// A bound action did not finish within the registry's action timeout
    #[error("action '{action}' bound to stat '{stat}' timed out after {timeout:?}")]
    ActionTimeout {
        stat: String,
        action: String,
        timeout: Duration,
    },
}

/// Error returned by a stat producer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ProducerError(String);

impl ProducerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error returned by a bound action
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ActionError(String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
