//! Boundary to the remote system that physically performs actions

use async_trait::async_trait;
use ha_core::ServiceCall;
use thiserror::Error;

/// Errors reported by a remote actuator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActuatorError {
    /// The request never produced a response (connection, DNS, timeout)
    #[error("request failed: {0}")]
    Transport(String),

    /// The remote side answered with a non-success status
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Executes service calls against the remote system
///
/// Implementations must bound the time a call may take. Callers never retry;
/// a retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait RemoteActuator: Send + Sync {
    async fn invoke(&self, call: &ServiceCall) -> Result<(), ActuatorError>;
}
