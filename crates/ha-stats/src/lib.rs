//! Stat registry and evaluation loop
//!
//! This crate is the rule engine proper. Stats are named, polled values;
//! bindings attach one condition value and one action to a stat; the
//! evaluation loop periodically samples every bound stat and fires the
//! actions whose condition matches.
//!
//! # Architecture
//!
//! ```text
//! producer() == condition  →  action()
//! ```
//!
//! - [`StatRegistry`] - Stat producers and bindings, [`StatRegistry::evaluate_all`]
//! - [`EvaluationLoop`] - Interval scheduler with cooperative shutdown
//! - [`time_stat`] - The built-in `HHMM` time-of-day producer
//!
//! Conditions compare by equality only. A range such as "between 18:00 and
//! 22:00" has to be expressed as its own boolean stat.

mod error;
pub mod registry;
pub mod scheduler;
pub mod time_stat;

pub use error::{ActionError, ProducerError, StatError, StatResult};
pub use registry::{
    Action, ActionFuture, ActionResult, EvaluationSummary, Producer, ProducerResult,
    SharedStatRegistry, StatRegistry, DEFAULT_ACTION_TIMEOUT,
};
pub use scheduler::EvaluationLoop;
pub use time_stat::{time_of_day, Clock, FixedClock, LocalClock};
