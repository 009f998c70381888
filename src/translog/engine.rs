//! Engine-side collaborators of the translog manager
//!
//! The owning engine exposes three hooks and a shutdown lock. The manager
//! holds the lock's read guard for every operation that touches the
//! translog; the engine takes the write guard while closing.

use crate::translog::error::TranslogError;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Callbacks into the engine that owns a translog
pub trait EngineHooks: Send + Sync {
    /// Fail if the engine is already closed
    fn ensure_open(&self) -> Result<(), TranslogError>;

    /// Fail the engine. May itself fail.
    fn fail_engine(&self, reason: &str, cause: &TranslogError) -> Result<(), TranslogError>;

    /// Called when the translog closed itself after a tragic event. Returns
    /// whether the engine was failed as a result.
    fn fail_on_tragic_event(&self, cause: &TranslogError) -> bool;
}

/// Reader/writer lock separating translog work from engine shutdown
#[derive(Debug, Default)]
pub struct EngineLock {
    lock: RwLock<()>,
}

impl EngineLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared guard for translog operations
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Exclusive guard for engine close
    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }
}

/// One recorded `fail_engine` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub reason: String,
    pub cause: String,
}

/// Engine hooks that record what happened instead of tearing anything down.
/// Used by the simulator and tests.
#[derive(Debug, Default)]
pub struct RecordingEngineHooks {
    closed: AtomicBool,
    fail_hooks: AtomicBool,
    failures: Mutex<Vec<EngineFailure>>,
    tragic_events: AtomicU64,
}

impl RecordingEngineHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the engine closed; `ensure_open` fails from now on
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Make `fail_engine` itself return an error
    pub fn set_fail_hooks(&self, fail: bool) {
        self.fail_hooks.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> Vec<EngineFailure> {
        self.failures.lock().clone()
    }

    pub fn tragic_events(&self) -> u64 {
        self.tragic_events.load(Ordering::SeqCst)
    }
}

impl EngineHooks for RecordingEngineHooks {
    fn ensure_open(&self) -> Result<(), TranslogError> {
        if self.is_closed() {
            return Err(TranslogError::AlreadyClosed {
                reason: "engine is closed".to_string(),
                tragic: None,
            });
        }
        Ok(())
    }

    fn fail_engine(&self, reason: &str, cause: &TranslogError) -> Result<(), TranslogError> {
        self.failures.lock().push(EngineFailure {
            reason: reason.to_string(),
            cause: cause.to_string(),
        });
        self.closed.store(true, Ordering::SeqCst);

        if self.fail_hooks.load(Ordering::SeqCst) {
            return Err(TranslogError::Engine(format!(
                "failed to fail engine: {}",
                reason
            )));
        }
        Ok(())
    }

    fn fail_on_tragic_event(&self, _cause: &TranslogError) -> bool {
        self.tragic_events.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        true
    }
}
