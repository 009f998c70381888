//! Translog lifecycle notifications

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer of translog lifecycle events. Every method defaults to a no-op.
pub trait TranslogEventListener: Send + Sync {
    /// Recovery is about to start (fired before any lifecycle check)
    fn on_begin_recovery(&self) {}

    fn on_recovery_complete(&self) {}

    /// A sync made previously appended operations durable
    fn on_sync(&self) {}

    /// A new current generation was opened
    fn on_generation_rolled(&self, _generation: u64) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTranslogEventListener;

impl TranslogEventListener for NoopTranslogEventListener {}

/// Fans every event out to each listener in order
#[derive(Default, Clone)]
pub struct CompositeTranslogEventListener {
    listeners: Vec<Arc<dyn TranslogEventListener>>,
}

impl CompositeTranslogEventListener {
    pub fn new(listeners: Vec<Arc<dyn TranslogEventListener>>) -> Self {
        CompositeTranslogEventListener { listeners }
    }

    pub fn push(&mut self, listener: Arc<dyn TranslogEventListener>) {
        self.listeners.push(listener);
    }
}

impl TranslogEventListener for CompositeTranslogEventListener {
    fn on_begin_recovery(&self) {
        self.listeners.iter().for_each(|l| l.on_begin_recovery());
    }

    fn on_recovery_complete(&self) {
        self.listeners.iter().for_each(|l| l.on_recovery_complete());
    }

    fn on_sync(&self) {
        self.listeners.iter().for_each(|l| l.on_sync());
    }

    fn on_generation_rolled(&self, generation: u64) {
        self.listeners
            .iter()
            .for_each(|l| l.on_generation_rolled(generation));
    }
}

/// Snapshot of `CountingTranslogEventListener` counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslogEventCounts {
    pub begin_recovery: u64,
    pub recovery_complete: u64,
    pub syncs: u64,
    pub rolls: u64,
    pub last_rolled_generation: u64,
}

/// Counts events; used by tests and the simulator
#[derive(Debug, Default)]
pub struct CountingTranslogEventListener {
    begin_recovery: AtomicU64,
    recovery_complete: AtomicU64,
    syncs: AtomicU64,
    rolls: AtomicU64,
    last_rolled_generation: AtomicU64,
}

impl CountingTranslogEventListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> TranslogEventCounts {
        TranslogEventCounts {
            begin_recovery: self.begin_recovery.load(Ordering::SeqCst),
            recovery_complete: self.recovery_complete.load(Ordering::SeqCst),
            syncs: self.syncs.load(Ordering::SeqCst),
            rolls: self.rolls.load(Ordering::SeqCst),
            last_rolled_generation: self.last_rolled_generation.load(Ordering::SeqCst),
        }
    }
}

impl TranslogEventListener for CountingTranslogEventListener {
    fn on_begin_recovery(&self) {
        self.begin_recovery.fetch_add(1, Ordering::SeqCst);
    }

    fn on_recovery_complete(&self) {
        self.recovery_complete.fetch_add(1, Ordering::SeqCst);
    }

    fn on_sync(&self) {
        self.syncs.fetch_add(1, Ordering::SeqCst);
    }

    fn on_generation_rolled(&self, generation: u64) {
        self.rolls.fetch_add(1, Ordering::SeqCst);
        self.last_rolled_generation
            .fetch_max(generation, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_fans_out() {
        let a = Arc::new(CountingTranslogEventListener::new());
        let b = Arc::new(CountingTranslogEventListener::new());
        let mut composite = CompositeTranslogEventListener::new(vec![a.clone()]);
        composite.push(b.clone());

        composite.on_begin_recovery();
        composite.on_sync();
        composite.on_sync();
        composite.on_generation_rolled(3);

        for counts in [a.counts(), b.counts()] {
            assert_eq!(counts.begin_recovery, 1);
            assert_eq!(counts.recovery_complete, 0);
            assert_eq!(counts.syncs, 2);
            assert_eq!(counts.rolls, 1);
            assert_eq!(counts.last_rolled_generation, 3);
        }
    }

    #[test]
    fn test_noop_listener_accepts_everything() {
        let listener = NoopTranslogEventListener;
        listener.on_begin_recovery();
        listener.on_recovery_complete();
        listener.on_sync();
        listener.on_generation_rolled(1);
    }
}
