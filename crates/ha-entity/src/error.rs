//! Error types for controllable entities

use ha_core::EntityId;
use ha_stats::StatError;
use thiserror::Error;

use crate::actuator::ActuatorError;

/// Result type for entity operations
pub type EntityResult<T> = Result<T, EntityError>;

/// Errors raised by controllable entities
#[derive(Debug, Error)]
pub enum EntityError {
    /// Action name is not in the entity kind's action set
    #[error("action '{action}' is not valid for {domain} entities. Valid actions: {valid}")]
    UnknownAction {
        domain: String,
        action: String,
        valid: String,
    },

    /// No entity kind handles this domain
    #[error("unsupported entity domain '{0}'")]
    UnsupportedDomain(String),

    /// Entity id's domain does not match the entity kind
    #[error("entity '{entity_id}' is not a {expected} entity")]
    DomainMismatch {
        entity_id: EntityId,
        expected: &'static str,
    },

    /// The remote actuator reported an error
    #[error("failed to call service {service} on {entity_id}: {source}")]
    RemoteCallFailure {
        entity_id: EntityId,
        service: String,
        #[source]
        source: ActuatorError,
    },

    /// Registering a rule with the stat registry failed
    #[error(transparent)]
    Stat(#[from] StatError),
}
