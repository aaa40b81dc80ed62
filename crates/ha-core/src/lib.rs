//! Core types for the stat rules engine
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace: EntityId, StatValue, Rule, ServiceCall and the remote State snapshot.

mod entity_id;
mod rule;
mod service_call;
mod stat_value;
mod state;

pub use entity_id::{EntityId, EntityIdError};
pub use rule::Rule;
pub use service_call::ServiceCall;
pub use stat_value::StatValue;
pub use state::State;

/// State value the remote instance reports for unreachable entities
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Name under which the process registers the time-of-day stat
pub const TIME_STAT: &str = "time";
