//! Home Assistant REST client
//!
//! Implements [`ha_entity::RemoteActuator`] over the two REST calls the rule
//! engine needs:
//!
//! - `POST /api/services/{domain}/{service}` to perform an action
//! - `GET /api/states` to list the entities the instance knows about
//!
//! Requests carry a bearer token and are bounded by a per-request timeout.

mod client;
mod error;

pub use client::{HaClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, ClientResult};
