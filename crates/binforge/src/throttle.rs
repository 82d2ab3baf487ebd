//! Per-caller command cooldown.
//!
//! A [`Throttle`] remembers when each caller last had a command accepted and
//! refuses new commands from that caller until the cooldown has elapsed. The
//! check and the update happen under one lock, so two commands dispatched in
//! parallel for the same caller can never both be accepted. The lock is never
//! held across an `.await`.
//!
//! Entries older than the cooldown carry no information (the caller would be
//! accepted anyway), so they are evicted:
//!
//! - on demand via [`Throttle::sweep`],
//! - opportunistically when the map grows past a high-water mark, and
//! - periodically by [`Throttle::spawn_sweeper`] (feature `sweeper`).

use crate::{SystemClock, TimeSource};
use core::time::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Identity of whoever issued a command (e.g. a chat user ID).
pub type CallerId = i64;

/// Cooldown used when none is configured.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Map size above which `try_accept` evicts stale entries before inserting.
const DEFAULT_HIGH_WATER: usize = 4096;

/// Per-caller cooldown gate; see the module docs for eviction.
pub struct Throttle<T = SystemClock> {
    last_accepted: Mutex<HashMap<CallerId, u64>>,
    cooldown_ms: u64,
    high_water: usize,
    time: T,
}

impl Throttle<SystemClock> {
    /// Creates a throttle backed by the monotonic [`SystemClock`].
    pub fn new(cooldown: Duration) -> Self {
        Self::with_time(cooldown, SystemClock::default())
    }
}

impl Default for Throttle<SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl<T: TimeSource> Throttle<T> {
    /// Creates a throttle reading time from `time`.
    pub fn with_time(cooldown: Duration, time: T) -> Self {
        Self {
            last_accepted: Mutex::new(HashMap::new()),
            cooldown_ms: cooldown.as_millis() as u64,
            high_water: DEFAULT_HIGH_WATER,
            time,
        }
    }

    /// Overrides the map size that triggers an inline sweep.
    pub fn with_high_water(mut self, high_water: usize) -> Self {
        self.high_water = high_water.max(1);
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Accepts a command from `caller` unless one was accepted within the
    /// cooldown window.
    ///
    /// A rejection leaves the recorded timestamp untouched, so a caller who
    /// keeps retrying is not locked out indefinitely.
    pub fn try_accept(&self, caller: CallerId) -> bool {
        let now = self.time.current_millis();
        let mut map = self.last_accepted.lock();

        if let Some(&last) = map.get(&caller) {
            if now.saturating_sub(last) < self.cooldown_ms {
                return false;
            }
        } else if map.len() >= self.high_water {
            evict_expired(&mut map, now, self.cooldown_ms);
        }

        map.insert(caller, now);
        true
    }

    /// Evicts every entry whose cooldown has fully elapsed and returns how
    /// many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.time.current_millis();
        let mut map = self.last_accepted.lock();
        let removed = evict_expired(&mut map, now, self.cooldown_ms);

        #[cfg(feature = "tracing")]
        if removed > 0 {
            tracing::debug!(removed, remaining = map.len(), "throttle entries swept");
        }

        removed
    }

    /// Number of callers currently tracked.
    pub fn len(&self) -> usize {
        self.last_accepted.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.lock().is_empty()
    }
}

#[cfg(feature = "sweeper")]
impl<T: TimeSource + Send + Sync + 'static> Throttle<T> {
    /// Spawns a task that calls [`Throttle::sweep`] every `interval` until
    /// `shutdown` is cancelled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_sweeper(
        self: &std::sync::Arc<Self>,
        interval: Duration,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let throttle = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("throttle sweeper shutting down");
                        break;
                    }
                    () = tokio::time::sleep(interval) => {
                        throttle.sweep();
                    }
                }
            }
        })
    }
}

fn evict_expired(map: &mut HashMap<CallerId, u64>, now: u64, cooldown_ms: u64) -> usize {
    let before = map.len();
    map.retain(|_, last| now.saturating_sub(*last) < cooldown_ms);
    before - map.len()
}
