//! Built-in time-of-day stat
//!
//! Samples the local wall clock as an `HHMM` integer: 09:05 is `905`, 23:59
//! is `2359`, midnight is `0`. Minute resolution, 24-hour clock.

use chrono::{Local, NaiveTime, Timelike};
use ha_core::StatValue;
use std::sync::{Arc, RwLock};

use crate::registry::ProducerResult;

/// Source of the current time of day
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveTime;
}

/// The local system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// A clock that reports whatever time it was last set to
///
/// Clones share the same reading.
#[derive(Debug, Clone)]
pub struct FixedClock {
    current: Arc<RwLock<NaiveTime>>,
}

impl FixedClock {
    pub fn at(time: NaiveTime) -> Self {
        Self {
            current: Arc::new(RwLock::new(time)),
        }
    }

    /// Clock reading at `hour:minute:00`; `None` if out of range
    pub fn at_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self::at)
    }

    pub fn set(&self, time: NaiveTime) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = time;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveTime {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Encode a time of day as `HHMM`
pub fn hhmm(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 100 + i64::from(time.minute())
}

/// Producer for the time-of-day stat
pub fn time_of_day<C>(clock: C) -> impl Fn() -> ProducerResult + Send + Sync + 'static
where
    C: Clock + 'static,
{
    move || Ok(StatValue::Int(hhmm(clock.now())))
}
