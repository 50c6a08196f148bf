//! Clock abstraction for bucket derivation.
//!
//! Counters never read the system time directly. Production code uses
//! [`SystemClock`]; tests and the `--now` CLI flag use [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Result, UsageGateError};

/// Port for obtaining the current instant.
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock whose time only moves when told to.
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// its counters and move time with another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock fixed at `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(at)),
        }
    }

    /// Create a clock from an RFC 3339 timestamp such as `2016-04-14T12:00:00Z`.
    pub fn parse_rfc3339(timestamp: &str) -> Result<Self> {
        Ok(Self::new(parse_instant(timestamp)?))
    }

    /// Move the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }

    /// Move the clock to an RFC 3339 timestamp.
    pub fn set_rfc3339(&self, timestamp: &str) -> Result<()> {
        self.set(parse_instant(timestamp)?);
        Ok(())
    }

    /// Advance the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock();
        *current += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

fn parse_instant(timestamp: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| UsageGateError::Config(format!("Invalid timestamp '{}': {}", timestamp, e)))
}
