//! Sources of nanosecond timestamps.
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Lower bound for substituted timestamps: 2020-01-01T00:00:00Z.
pub const FALLBACK_FLOOR_NANOS: i64 = 1_577_836_800 * NANOS_PER_SEC;

/// Supplies "now" as nanoseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> i64;
}

/// A raw wall-clock reading, `None` when the OS can't give a usable one.
pub trait TimeSource: Send + Sync {
    fn epoch_nanos(&self) -> Option<i64>;
}

/// The operating system's wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsTime;

impl TimeSource for OsTime {
    fn epoch_nanos(&self) -> Option<i64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| i64::try_from(d.as_nanos()).ok())
    }
}

/// Reads a wall clock, never going backwards past a failed reading.
///
/// If the source reports a time before the epoch (or too far after it to fit
/// an i64), the last value handed out plus one nanosecond is returned
/// instead. Substitutes never drop below [`FALLBACK_FLOOR_NANOS`], so a
/// failure on the very first reading yields the floor itself.
#[derive(Debug)]
pub struct SystemClock<S = OsTime> {
    source: S,
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::with_source(OsTime)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TimeSource> SystemClock<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            last: AtomicI64::new(0),
        }
    }
}

impl<S: TimeSource> Clock for SystemClock<S> {
    fn now_nanos(&self) -> i64 {
        match self.source.epoch_nanos() {
            Some(now) => {
                self.last.fetch_max(now, Ordering::Relaxed);
                now
            },
            None => {
                let step =
                    |l: i64| l.max(FALLBACK_FLOOR_NANOS - 1).saturating_add(1);
                // The closure always returns Some, so both arms carry the
                // previous value.
                let prev = match self.last.fetch_update(
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                    |l| Some(step(l)),
                ) {
                    Ok(prev) | Err(prev) => prev,
                };
                let fallback = step(prev);
                warn!(fallback, "system clock unusable, substituting");
                fallback
            },
        }
    }
}

/// Always returns the same instant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_nanos(&self) -> i64 {
        self.0
    }
}
