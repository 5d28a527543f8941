use chrono::{DateTime, Utc};

/// A source of wall-clock time for issuance timestamps.
///
/// This abstraction allows plugging the real system clock, or a fixed instant
/// in tests so expirations and certificate ids are predictable.
///
/// # Example
///
/// ```
/// use certigen::{FixedClock, TimeSource};
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
/// assert_eq!(FixedClock::new(at).now(), at);
/// ```
pub trait TimeSource: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Nanoseconds since the Unix epoch, saturating outside the representable
/// range (roughly years 1677 to 2262).
pub fn unix_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or_else(|| {
        if at.timestamp() < 0 {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}
