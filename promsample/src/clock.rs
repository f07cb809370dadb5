//! Time collaborators: the wall clock and the timestamp converter.
//!
//! A parsed line either carries an explicit millisecond timestamp or falls
//! back to [`Clock::now_ms`]. Either way the millisecond value is passed
//! through a [`TimestampFormat`] before it is stored in the record.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Microseconds between the Unix epoch and 2000-01-01T00:00:00Z.
const POSTGRES_EPOCH_OFFSET_MICROS: i64 = 946_684_800_000_000;

/// Source of the current time for lines without an explicit timestamp.
pub trait Clock {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        // A clock set before 1970 reports a negative offset rather than failing.
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis())
                .map(|ms| -ms)
                .unwrap_or(i64::MIN),
        }
    }
}

/// A clock frozen at a single instant.
///
/// # Examples
///
/// ```rust
/// use promsample::clock::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_700_000_000_000);
/// assert_eq!(clock.now_ms(), 1_700_000_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    now_ms: i64,
}

impl FixedClock {
    /// Creates a clock that always reports `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        Self { now_ms }
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// How a millisecond timestamp is represented inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    /// Milliseconds since the Unix epoch, stored as parsed.
    #[default]
    UnixMillis,
    /// Microseconds since 2000-01-01T00:00:00Z, PostgreSQL's `timestamptz`
    /// representation.
    Postgres,
}

impl TimestampFormat {
    /// Converts microseconds since the Unix epoch to the internal form.
    ///
    /// Returns `None` if the result does not fit in an `i64`.
    pub fn to_internal(self, epoch_micros: i64) -> Option<i64> {
        match self {
            Self::UnixMillis => Some(epoch_micros.div_euclid(1000)),
            Self::Postgres => epoch_micros.checked_sub(POSTGRES_EPOCH_OFFSET_MICROS),
        }
    }

    /// Converts milliseconds since the Unix epoch to the internal form.
    ///
    /// Unix milliseconds are stored as-is, so this never fails for
    /// [`TimestampFormat::UnixMillis`].
    pub fn internal_from_millis(self, millis: i64) -> Option<i64> {
        match self {
            Self::UnixMillis => Some(millis),
            Self::Postgres => self.to_internal(millis.checked_mul(1000)?),
        }
    }

    /// Converts an internal timestamp back to milliseconds since the Unix epoch.
    pub fn to_unix_millis(self, internal: i64) -> i64 {
        match self {
            Self::UnixMillis => internal,
            Self::Postgres => internal
                .saturating_add(POSTGRES_EPOCH_OFFSET_MICROS)
                .div_euclid(1000),
        }
    }
}
