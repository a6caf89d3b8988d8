//! Time source for token timestamps
//!
//! Every time-dependent decision in the authority (issue time, expiry,
//! refresh horizon, blocklist eviction, key windows) reads from a [`Clock`].
//! Production code uses [`SystemClock`]; tests drive a [`ManualClock`].

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Injectable wall clock
pub trait Clock: Send + Sync + Debug {
    /// Current wall-clock time
    fn now(&self) -> SystemTime;

    /// Current time as whole unix seconds (the resolution tokens carry)
    fn unix_now(&self) -> u64 {
        unix_seconds(self.now())
    }
}

/// Whole seconds since the unix epoch; times before the epoch clamp to 0
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Latest instant the authority will represent: 9999-12-31T23:59:59Z
pub const MAX_UNIX_SECONDS: u64 = 253_402_300_799;

/// Convert unix seconds back into a `SystemTime`, clamped to
/// [`MAX_UNIX_SECONDS`]
pub fn from_unix_seconds(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.min(MAX_UNIX_SECONDS))
}

/// The operating system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to
///
/// Cloning shares the underlying time, so a test can hand one clone to the
/// authority and keep another to advance.
///
/// ```
/// use std::time::Duration;
/// use warden_auth::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::at_unix(0);
/// clock.advance(Duration::from_secs(3601));
/// assert_eq!(clock.unix_now(), 3601);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Arc<AtomicU64>,
}

impl ManualClock {
    /// Start the clock at the given unix second
    pub fn at_unix(secs: u64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(secs)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.secs.fetch_add(by.as_secs(), Ordering::SeqCst);
    }

    /// Jump to an absolute unix second
    pub fn set_unix(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        from_unix_seconds(self.secs.load(Ordering::SeqCst))
    }
}
