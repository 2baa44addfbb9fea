use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time, in seconds since the Unix epoch.
///
/// Devices often boot without a synchronized clock, so reading the time is
/// allowed to fail.
pub trait Clock {
    fn unix_time(&self) -> Option<u64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_time(&self) -> Option<u64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|elapsed| elapsed.as_secs())
    }
}
