use std::time::Instant;

/// A trait for time sources that return a monotonic millisecond timestamp.
///
/// This abstraction allows you to plug in the real monotonic clock or a mocked
/// time source in tests. Only differences between two readings are meaningful.
///
/// # Example
///
/// ```
/// use binforge::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since an arbitrary origin.
    fn current_millis(&self) -> u64;
}

/// A monotonic clock measuring milliseconds elapsed since construction.
///
/// Backed by [`Instant`], so wall-clock adjustments (NTP, DST) never move it
/// backwards.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}
