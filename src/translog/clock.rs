//! Clock abstraction for generation ages
//!
//! Retention-by-age and checkpoint timestamps read time through this trait so
//! simulations can drive virtual time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Millisecond wall clock
///
/// Implementations:
/// - `ProductionClock`: real system time
/// - `SimulatedClock`: virtual time for DST
pub trait TranslogClock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch (or since simulation start)
    fn now_ms(&self) -> u64;

    /// Milliseconds elapsed since `since_ms`, saturating at zero
    fn elapsed_ms(&self, since_ms: u64) -> u64 {
        self.now_ms().saturating_sub(since_ms)
    }
}

/// Production clock using real system time
#[derive(Clone)]
pub struct ProductionClock {
    start: Instant,
    start_millis: u64,
}

impl Default for ProductionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionClock {
    pub fn new() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        // A clock set before the epoch reads as zero rather than failing
        let start_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        ProductionClock {
            start: Instant::now(),
            start_millis,
        }
    }
}

impl TranslogClock for ProductionClock {
    fn now_ms(&self) -> u64 {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.start_millis.saturating_add(elapsed)
    }
}

/// Simulated clock for deterministic testing
///
/// Time only advances through `advance()` or `set()`. Clones share state.
#[derive(Clone, Default)]
pub struct SimulatedClock {
    time_ms: Arc<AtomicU64>,
}

impl SimulatedClock {
    pub fn new(start_ms: u64) -> Self {
        SimulatedClock {
            time_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.time_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time_ms: u64) {
        self.time_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl TranslogClock for SimulatedClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.load(Ordering::SeqCst)
    }
}
