//! Controllable entities
//!
//! This crate models the remote devices the rule engine drives. Each entity
//! kind (switch, light, cover) has a closed action set; entities perform
//! those actions through a [`RemoteActuator`] and register rules into the
//! shared [`ha_stats::StatRegistry`].
//!
//! # Key Types
//!
//! - [`Controllable`] - Object-safe interface implemented by every entity kind
//! - [`Entity`] - Generic entity over an [`EntityAction`] set
//! - [`RemoteActuator`] - Boundary to the system that performs actions
//! - [`OperationLog`] - Append-only audit log of performed actions

pub mod action;
pub mod actuator;
pub mod entity;
mod error;
pub mod log;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use action::{CoverAction, EntityAction, LightAction, SwitchAction};
pub use actuator::{ActuatorError, RemoteActuator};
pub use entity::{build_entity, Controllable, CoverEntity, Entity, LightEntity, SwitchEntity};
pub use error::{EntityError, EntityResult};
pub use log::{LogEntry, OperationLog, Outcome};
