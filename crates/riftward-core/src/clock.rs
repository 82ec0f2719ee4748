//! Wall-clock seam used to timestamp checkpoints and turn results.
//!
//! Nothing in the turn pipeline branches on time, so a fixed clock in tests
//! makes every recorded timestamp reproducible.

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of timestamps for checkpoints and turn results.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time formatted as RFC 3339 with millisecond
    /// precision, the form written into turn results.
    fn stamp(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
