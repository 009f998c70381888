//! Translog lifecycle manager
//!
//! Owns one shard's `Translog` on behalf of its engine:
//!
//! - rolls and trims generations, failing the engine when that goes wrong
//! - gates flushes until the unflushed tail has been replayed on open
//! - forwards sync requests and reports them to the event listener
//!
//! Every operation that touches the translog holds the engine's shared
//! `EngineLock` guard, so the engine cannot finish closing underneath it.
//!
//! ## Failure handling
//!
//! ```text
//! AlreadyClosed  -> hooks.fail_on_tragic_event(err); return err unchanged
//! anything else  -> hooks.fail_engine(reason, err)   (hook error suppressed)
//!                   return Operation { message, source: err }
//! ```

use crate::translog::clock::{ProductionClock, TranslogClock};
use crate::translog::config::TranslogConfig;
use crate::translog::deletion_policy::{DefaultDeletionPolicy, DeletionPolicy};
use crate::translog::engine::{EngineHooks, EngineLock};
use crate::translog::error::TranslogError;
use crate::translog::file_store::GenerationStore;
use crate::translog::listener::{NoopTranslogEventListener, TranslogEventListener};
use crate::translog::log::{
    Location, PrimaryTermSupplier, SeqNoSupplier, Translog, TranslogDeps, TranslogStats,
};
use crate::translog::seqno::{LocalCheckpointTracker, SeqNo, NO_OPS_PERFORMED};
use crate::translog::snapshot::Snapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Everything needed to open a manager. Optional collaborators default to
/// no-ops and can be overridden with the `with_*` builders.
pub struct TranslogManagerArgs<S: GenerationStore> {
    pub shard_id: String,
    pub config: TranslogConfig,
    pub translog_uuid: String,
    pub store: S,
    pub engine_lock: Arc<EngineLock>,
    pub hooks: Arc<dyn EngineHooks>,
    pub listener: Arc<dyn TranslogEventListener>,
    /// Overrides the retention-based policy built from `config`
    pub deletion_policy: Option<Arc<dyn DeletionPolicy>>,
    pub global_checkpoint_supplier: SeqNoSupplier,
    pub primary_term_supplier: PrimaryTermSupplier,
    /// Marked persisted as generations are synced
    pub local_checkpoint_tracker: Option<Arc<LocalCheckpointTracker>>,
    pub clock: Arc<dyn TranslogClock>,
}

impl<S: GenerationStore> TranslogManagerArgs<S> {
    pub fn new(
        shard_id: impl Into<String>,
        config: TranslogConfig,
        translog_uuid: impl Into<String>,
        store: S,
        hooks: Arc<dyn EngineHooks>,
    ) -> Self {
        TranslogManagerArgs {
            shard_id: shard_id.into(),
            config,
            translog_uuid: translog_uuid.into(),
            store,
            engine_lock: Arc::new(EngineLock::new()),
            hooks,
            listener: Arc::new(NoopTranslogEventListener),
            deletion_policy: None,
            global_checkpoint_supplier: Arc::new(|| NO_OPS_PERFORMED),
            primary_term_supplier: Arc::new(|| 1),
            local_checkpoint_tracker: None,
            clock: Arc::new(ProductionClock::new()),
        }
    }

    pub fn with_engine_lock(mut self, engine_lock: Arc<EngineLock>) -> Self {
        self.engine_lock = engine_lock;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn TranslogEventListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_deletion_policy(mut self, policy: Arc<dyn DeletionPolicy>) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    pub fn with_global_checkpoint_supplier(mut self, supplier: SeqNoSupplier) -> Self {
        self.global_checkpoint_supplier = supplier;
        self
    }

    pub fn with_primary_term_supplier(mut self, supplier: PrimaryTermSupplier) -> Self {
        self.primary_term_supplier = supplier;
        self
    }

    pub fn with_local_checkpoint_tracker(mut self, tracker: Arc<LocalCheckpointTracker>) -> Self {
        self.local_checkpoint_tracker = Some(tracker);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn TranslogClock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Lifecycle manager for one shard's translog
pub struct TranslogManager<S: GenerationStore> {
    shard_id: String,
    translog: Translog<S>,
    engine_lock: Arc<EngineLock>,
    hooks: Arc<dyn EngineHooks>,
    listener: Arc<dyn TranslogEventListener>,
    pending_translog_recovery: AtomicBool,
}

impl<S: GenerationStore> TranslogManager<S> {
    /// Open (or create) the translog. Recovery is pending until
    /// `recover_from_translog` or `skip_translog_recovery` runs.
    pub fn open(args: TranslogManagerArgs<S>) -> Result<Self, TranslogError> {
        let TranslogManagerArgs {
            shard_id,
            config,
            translog_uuid,
            store,
            engine_lock,
            hooks,
            listener,
            deletion_policy,
            global_checkpoint_supplier,
            primary_term_supplier,
            local_checkpoint_tracker,
            clock,
        } = args;

        let deletion_policy = deletion_policy.unwrap_or_else(|| {
            Arc::new(DefaultDeletionPolicy::new(config.retention.clone()))
                as Arc<dyn DeletionPolicy>
        });

        let mut deps = TranslogDeps::new(deletion_policy);
        deps.clock = clock;
        deps.global_checkpoint_supplier = global_checkpoint_supplier;
        deps.primary_term_supplier = primary_term_supplier;
        deps.persisted_seq_no_consumer = local_checkpoint_tracker.map(|tracker| {
            Arc::new(move |seq_no: SeqNo| tracker.mark_seq_no_as_persisted(seq_no))
                as Arc<dyn Fn(SeqNo) + Send + Sync>
        });

        let translog =
            Translog::open(&shard_id, &config, &translog_uuid, store, deps).map_err(|e| {
                TranslogError::Initialization {
                    shard_id: shard_id.clone(),
                    source: Box::new(e),
                }
            })?;

        info!(
            "[{}] translog manager opened, recovery pending (durability {:?})",
            shard_id, config.durability
        );

        Ok(TranslogManager {
            shard_id,
            translog,
            engine_lock,
            hooks,
            listener,
            pending_translog_recovery: AtomicBool::new(true),
        })
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// The underlying translog; the engine appends through it. With
    /// `ensure_open`, fails once the engine or the translog is closed.
    pub fn translog(&self, ensure_open: bool) -> Result<&Translog<S>, TranslogError> {
        if ensure_open {
            self.hooks.ensure_open()?;
            self.translog.ensure_open()?;
        }
        Ok(&self.translog)
    }

    pub fn engine_lock(&self) -> &Arc<EngineLock> {
        &self.engine_lock
    }

    pub fn is_recovery_pending(&self) -> bool {
        self.pending_translog_recovery.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Roll / Trim
    // ========================================================================

    /// Seal the current generation, open a new one, then trim
    pub fn roll_translog_generation(&self) -> Result<(), TranslogError> {
        let _guard = self.engine_lock.read();
        let fail = |e| self.fail_engine_on(e, "translog trimming failed", "failed to roll translog");

        self.hooks.ensure_open().map_err(fail)?;
        let generation = self.translog.roll_generation().map_err(fail)?;
        self.listener.on_generation_rolled(generation);

        self.translog.trim_unreferenced_readers().map_err(fail)?;
        Ok(())
    }

    /// Delete generations the deletion policy no longer needs
    pub fn trim_unreferenced_translog_files(&self) -> Result<(), TranslogError> {
        let _guard = self.engine_lock.read();
        let fail = |e| self.fail_engine_on(e, "translog trimming failed", "failed to trim translog");

        self.hooks.ensure_open().map_err(fail)?;
        self.translog.trim_unreferenced_readers().map_err(fail)?;
        Ok(())
    }

    /// Hide operations above `above_seq_no` written under terms below
    /// `below_term`. Rolls first, so the listener sees a new generation.
    pub fn trim_operations_from_translog(
        &self,
        below_term: u64,
        above_seq_no: SeqNo,
    ) -> Result<(), TranslogError> {
        let _guard = self.engine_lock.read();
        let fail = |e| {
            self.fail_engine_on(
                e,
                "translog operations trimming failed",
                "failed to trim translog operations",
            )
        };

        self.hooks.ensure_open().map_err(fail)?;
        let generation = self
            .translog
            .trim_operations(below_term, above_seq_no)
            .map_err(fail)?;
        self.listener.on_generation_rolled(generation);
        Ok(())
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Replay operations in `(local_checkpoint, recover_up_to_seq_no]` and
    /// re-enable flushes. Returns the number of operations replayed.
    pub fn recover_from_translog<F>(
        &self,
        replay: F,
        local_checkpoint: SeqNo,
        recover_up_to_seq_no: SeqNo,
    ) -> Result<usize, TranslogError>
    where
        F: FnOnce(&mut Snapshot) -> Result<usize, TranslogError>,
    {
        self.listener.on_begin_recovery();

        let _guard = self.engine_lock.read();
        self.hooks.ensure_open()?;
        if !self.pending_translog_recovery.load(Ordering::SeqCst) {
            return Err(TranslogError::IllegalLifecycleState(
                "engine has already been recovered".to_string(),
            ));
        }

        match self.recover_locked(replay, local_checkpoint, recover_up_to_seq_no) {
            Ok(recovered) => {
                let was_pending = self.pending_translog_recovery.swap(false, Ordering::SeqCst);
                debug_assert!(
                    was_pending,
                    "Postcondition: recovery must clear a pending flag exactly once"
                );
                trace!(
                    "[{}] flushes enabled after recovering {} operations, translog generation {}",
                    self.shard_id,
                    recovered,
                    self.translog.current_generation()
                );
                self.listener.on_recovery_complete();
                Ok(recovered)
            }
            Err(err) => {
                self.pending_translog_recovery.store(true, Ordering::SeqCst);
                Err(self.fail_engine_best_effort("failed to recover from translog", err))
            }
        }
    }

    fn recover_locked<F>(
        &self,
        replay: F,
        local_checkpoint: SeqNo,
        recover_up_to_seq_no: SeqNo,
    ) -> Result<usize, TranslogError>
    where
        F: FnOnce(&mut Snapshot) -> Result<usize, TranslogError>,
    {
        if local_checkpoint >= recover_up_to_seq_no {
            trace!(
                "[{}] nothing to recover: local checkpoint {} >= {}",
                self.shard_id,
                local_checkpoint,
                recover_up_to_seq_no
            );
            return Ok(0);
        }

        let from = local_checkpoint.saturating_add(1);
        let wrap = |e| {
            TranslogError::operation(&self.shard_id, "failed to recover from translog", e)
        };
        let mut snapshot = self
            .translog
            .new_snapshot(from, recover_up_to_seq_no)
            .map_err(wrap)?;
        trace!(
            "[{}] replaying {} translog operations in [{}, {}]",
            self.shard_id,
            snapshot.total_operations(),
            from,
            recover_up_to_seq_no
        );
        replay(&mut snapshot).map_err(wrap)
    }

    /// Replay every operation above `processed_checkpoint`, regardless of
    /// the recovery flag
    pub fn restore_local_history_from_translog<F>(
        &self,
        processed_checkpoint: SeqNo,
        replay: F,
    ) -> Result<usize, TranslogError>
    where
        F: FnOnce(&mut Snapshot) -> Result<usize, TranslogError>,
    {
        let _guard = self.engine_lock.read();
        self.hooks.ensure_open()?;
        let mut snapshot = self
            .translog
            .new_snapshot(processed_checkpoint.saturating_add(1), SeqNo::MAX)?;
        replay(&mut snapshot)
    }

    /// Fails while translog recovery is still pending
    pub fn ensure_can_flush(&self) -> Result<(), TranslogError> {
        if self.pending_translog_recovery.load(Ordering::SeqCst) {
            return Err(TranslogError::IllegalLifecycleState(format!(
                "{} flushes are disabled - pending translog recovery",
                self.shard_id
            )));
        }
        Ok(())
    }

    /// Mark recovery done without replaying anything
    pub fn skip_translog_recovery(&self) {
        let was_pending = self.pending_translog_recovery.swap(false, Ordering::SeqCst);
        debug_assert!(
            was_pending,
            "Precondition: translog recovery must be pending to be skipped"
        );
        debug!("[{}] skipped translog recovery", self.shard_id);
    }

    // ========================================================================
    // Sync
    // ========================================================================

    pub fn is_translog_sync_needed(&self) -> Result<bool, TranslogError> {
        Ok(self.translog(true)?.sync_needed())
    }

    /// Sync if any of `locations` is not yet durable. Returns whether a sync
    /// happened.
    pub fn ensure_translog_synced(&self, locations: &[Location]) -> Result<bool, TranslogError> {
        let _guard = self.engine_lock.read();
        let synced = self.translog.ensure_synced(locations)?;
        if synced {
            self.listener.on_sync();
        }
        Ok(synced)
    }

    pub fn sync_translog(&self) -> Result<(), TranslogError> {
        let _guard = self.engine_lock.read();
        self.translog.sync()?;
        self.listener.on_sync();
        Ok(())
    }

    pub fn should_roll_translog_generation(&self) -> Result<bool, TranslogError> {
        Ok(self.translog(true)?.should_roll_generation())
    }

    pub fn translog_stats(&self) -> Result<TranslogStats, TranslogError> {
        Ok(self.translog(true)?.stats())
    }

    pub fn translog_last_write_location(&self) -> Result<Location, TranslogError> {
        Ok(self.translog(true)?.last_write_location())
    }

    /// Close the translog under the exclusive engine guard
    pub fn close(&self) -> Result<(), TranslogError> {
        let _guard = self.engine_lock.write();
        self.translog.close()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn fail_engine_on(&self, err: TranslogError, reason: &str, message: &str) -> TranslogError {
        if err.is_already_closed() {
            self.hooks.fail_on_tragic_event(&err);
            return err;
        }
        let wrapped = TranslogError::operation(&self.shard_id, message, err);
        self.fail_engine_best_effort(reason, wrapped)
    }

    /// Fail the engine; a failing hook is attached to `err` as suppressed
    fn fail_engine_best_effort(&self, reason: &str, err: TranslogError) -> TranslogError {
        warn!("[{}] failing engine, {}: {}", self.shard_id, reason, err);
        match self.hooks.fail_engine(reason, &err) {
            Ok(()) => err,
            Err(hook_err) => {
                warn!(
                    "[{}] fail_engine hook failed: {}",
                    self.shard_id, hook_err
                );
                err.with_suppressed(hook_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SimulatedRng;
    use crate::translog::engine::RecordingEngineHooks;
    use crate::translog::file_store::{
        InMemoryGenerationStore, SimulatedGenerationStore, SimulatedStoreConfig,
    };
    use crate::translog::listener::CountingTranslogEventListener;
    use crate::translog::operation::Operation;

    struct Harness {
        manager: TranslogManager<InMemoryGenerationStore>,
        hooks: Arc<RecordingEngineHooks>,
        listener: Arc<CountingTranslogEventListener>,
    }

    fn harness() -> Harness {
        let hooks = Arc::new(RecordingEngineHooks::new());
        let listener = Arc::new(CountingTranslogEventListener::new());
        let args = TranslogManagerArgs::new(
            "[index][0]",
            TranslogConfig::test(),
            Translog::<InMemoryGenerationStore>::new_uuid(),
            InMemoryGenerationStore::new(),
            hooks.clone(),
        )
        .with_listener(listener.clone());
        Harness {
            manager: TranslogManager::open(args).unwrap(),
            hooks,
            listener,
        }
    }

    fn append(manager: &TranslogManager<InMemoryGenerationStore>, seq_nos: std::ops::Range<SeqNo>) {
        let translog = manager.translog(true).unwrap();
        for seq_no in seq_nos {
            translog
                .add(&Operation::new(seq_no, 1, b"doc".to_vec()))
                .unwrap();
        }
    }

    #[test]
    fn test_flushes_gated_until_recovery() {
        let h = harness();
        assert!(h.manager.is_recovery_pending());

        let err = h.manager.ensure_can_flush().unwrap_err();
        assert_eq!(
            err.to_string(),
            "[index][0] flushes are disabled - pending translog recovery"
        );

        h.manager.skip_translog_recovery();
        assert!(h.manager.ensure_can_flush().is_ok());
    }

    #[test]
    fn test_empty_range_recovers_nothing() {
        let h = harness();
        let mut invoked = false;

        let recovered = h
            .manager
            .recover_from_translog(
                |_| {
                    invoked = true;
                    Ok(0)
                },
                10,
                10,
            )
            .unwrap();

        assert_eq!(recovered, 0);
        assert!(!invoked);
        assert!(!h.manager.is_recovery_pending());
        assert_eq!(h.listener.counts().begin_recovery, 1);
        assert_eq!(h.listener.counts().recovery_complete, 1);
    }

    #[test]
    fn test_second_recovery_rejected() {
        let h = harness();
        h.manager.recover_from_translog(|_| Ok(0), -1, -1).unwrap();

        let err = h
            .manager
            .recover_from_translog(|_| Ok(0), -1, 5)
            .unwrap_err();
        assert!(matches!(err, TranslogError::IllegalLifecycleState(_)));
        assert!(!h.manager.is_recovery_pending());
        // The begin event fires before the lifecycle check
        assert_eq!(h.listener.counts().begin_recovery, 2);
        assert_eq!(h.listener.counts().recovery_complete, 1);
    }

    #[test]
    fn test_recovery_on_closed_engine_fails() {
        let h = harness();
        h.hooks.close();

        let err = h
            .manager
            .recover_from_translog(|_| Ok(0), -1, 5)
            .unwrap_err();
        assert!(err.is_already_closed());
        assert!(h.manager.is_recovery_pending());
    }

    #[test]
    fn test_replay_failure_rearms_and_fails_engine() {
        let h = harness();
        append(&h.manager, 0..5);

        let err = h
            .manager
            .recover_from_translog(
                |_| Err(TranslogError::Replay("bad doc".to_string())),
                -1,
                4,
            )
            .unwrap_err();

        match &err {
            TranslogError::Operation {
                message, source, ..
            } => {
                assert_eq!(message, "failed to recover from translog");
                assert!(matches!(**source, TranslogError::Replay(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(h.manager.is_recovery_pending());
        assert!(h.manager.ensure_can_flush().is_err());
        assert_eq!(h.hooks.failures().len(), 1);
        assert_eq!(h.hooks.failures()[0].reason, "failed to recover from translog");
        assert_eq!(h.listener.counts().recovery_complete, 0);
    }

    #[test]
    fn test_hook_failure_is_suppressed() {
        let h = harness();
        append(&h.manager, 0..3);
        h.hooks.set_fail_hooks(true);

        let err = h
            .manager
            .recover_from_translog(
                |_| Err(TranslogError::Replay("bad doc".to_string())),
                -1,
                2,
            )
            .unwrap_err();

        assert_eq!(err.suppressed().len(), 1);
        assert!(matches!(err.suppressed()[0], TranslogError::Engine(_)));
        assert!(matches!(err.cause(), Some(TranslogError::Replay(_))));
    }

    #[test]
    fn test_restore_local_history_ignores_flag() {
        let h = harness();
        append(&h.manager, 0..10);
        h.manager.skip_translog_recovery();

        let mut seen = Vec::new();
        let restored = h
            .manager
            .restore_local_history_from_translog(6, |snapshot| {
                seen.extend(snapshot.by_ref().map(|op| op.seq_no));
                Ok(seen.len())
            })
            .unwrap();

        assert_eq!(restored, 3);
        assert_eq!(seen, vec![7, 8, 9]);
    }

    #[test]
    fn test_ensure_synced_fires_on_sync_once() {
        let h = harness();
        let location = h
            .manager
            .translog(true)
            .unwrap()
            .add(&Operation::new(0, 1, b"doc".to_vec()))
            .unwrap();
        assert!(h.manager.is_translog_sync_needed().unwrap());

        assert!(h.manager.ensure_translog_synced(&[location]).unwrap());
        assert!(!h.manager.ensure_translog_synced(&[location]).unwrap());
        assert_eq!(h.listener.counts().syncs, 1);

        h.manager.sync_translog().unwrap();
        assert_eq!(h.listener.counts().syncs, 2);
        assert!(!h.manager.is_translog_sync_needed().unwrap());
    }

    #[test]
    fn test_roll_notifies_and_trims() {
        let h = harness();
        append(&h.manager, 0..5);
        h.manager
            .translog(true)
            .unwrap()
            .deletion_policy()
            .set_local_checkpoint_of_safe_commit(4);

        h.manager.roll_translog_generation().unwrap();

        assert_eq!(h.listener.counts().rolls, 1);
        assert_eq!(h.listener.counts().last_rolled_generation, 2);
        let stats = h.manager.translog_stats().unwrap();
        assert_eq!(stats.generation_count, 1);
        assert_eq!(stats.current_generation, 2);
        assert_eq!(h.manager.translog_last_write_location().unwrap().generation, 2);
    }

    #[test]
    fn test_closed_engine_refuses_roll_and_trims() {
        let h = harness();
        append(&h.manager, 0..5);
        let generation = h.manager.translog(true).unwrap().current_generation();
        h.hooks.close();

        let err = h.manager.roll_translog_generation().unwrap_err();
        assert!(err.is_already_closed());
        let err = h.manager.trim_unreferenced_translog_files().unwrap_err();
        assert!(err.is_already_closed());
        let err = h.manager.trim_operations_from_translog(2, 1).unwrap_err();
        assert!(err.is_already_closed());

        assert_eq!(h.hooks.tragic_events(), 3);
        assert!(h.hooks.failures().is_empty());
        assert_eq!(h.listener.counts().rolls, 0);
        assert_eq!(h.manager.translog(false).unwrap().current_generation(), generation);

        assert!(h.manager.translog(true).is_err());
        assert!(h.manager.is_translog_sync_needed().is_err());
        assert!(h.manager.should_roll_translog_generation().is_err());
        assert!(h.manager.translog_stats().is_err());
        assert!(h.manager.translog_last_write_location().is_err());
    }

    /// Open engine whose `ensure_open` fails with a non-close error
    struct BrokenEngine {
        inner: RecordingEngineHooks,
    }

    impl EngineHooks for BrokenEngine {
        fn ensure_open(&self) -> Result<(), TranslogError> {
            Err(TranslogError::Engine("engine lock poisoned".to_string()))
        }

        fn fail_engine(&self, reason: &str, cause: &TranslogError) -> Result<(), TranslogError> {
            self.inner.fail_engine(reason, cause)
        }

        fn fail_on_tragic_event(&self, cause: &TranslogError) -> bool {
            self.inner.fail_on_tragic_event(cause)
        }
    }

    #[test]
    fn test_ensure_open_error_fails_engine() {
        let hooks = Arc::new(BrokenEngine {
            inner: RecordingEngineHooks::new(),
        });
        let manager = TranslogManager::open(TranslogManagerArgs::new(
            "[index][0]",
            TranslogConfig::test(),
            Translog::<InMemoryGenerationStore>::new_uuid(),
            InMemoryGenerationStore::new(),
            hooks.clone(),
        ))
        .unwrap();

        let err = manager.roll_translog_generation().unwrap_err();
        assert!(matches!(
            &err,
            TranslogError::Operation { message, .. } if message == "failed to roll translog"
        ));
        assert_eq!(hooks.inner.failures()[0].reason, "translog trimming failed");
        assert_eq!(hooks.inner.tragic_events(), 0);
    }

    #[test]
    fn test_trim_operations_notifies_roll() {
        let h = harness();
        append(&h.manager, 0..5);

        h.manager.trim_operations_from_translog(2, 2).unwrap();

        let counts = h.listener.counts();
        assert_eq!(counts.rolls, 1);
        assert_eq!(counts.last_rolled_generation, 2);
        assert_eq!(
            h.manager.translog_stats().unwrap().current_generation,
            counts.last_rolled_generation
        );
    }

    #[test]
    fn test_tragic_close_calls_tragic_hook() {
        let hooks = Arc::new(RecordingEngineHooks::new());
        let store = SimulatedGenerationStore::new(
            SimulatedRng::new(3),
            SimulatedStoreConfig::no_faults(),
        );
        let manager = TranslogManager::open(TranslogManagerArgs::new(
            "[index][0]",
            TranslogConfig::test(),
            Translog::<InMemoryGenerationStore>::new_uuid(),
            store.clone(),
            hooks.clone(),
        ))
        .unwrap();
        manager
            .translog(true)
            .unwrap()
            .add(&Operation::new(0, 1, b"doc".to_vec()))
            .unwrap();

        store.set_config(SimulatedStoreConfig {
            fsync_fail_prob: 1.0,
            ..SimulatedStoreConfig::no_faults()
        });

        // First failure is the I/O error itself
        let err = manager.roll_translog_generation().unwrap_err();
        assert!(matches!(
            &err,
            TranslogError::Operation { message, .. } if message == "failed to roll translog"
        ));
        assert_eq!(hooks.failures()[0].reason, "translog trimming failed");

        // Later calls see the closed translog and go through the tragic hook
        let err = manager.roll_translog_generation().unwrap_err();
        assert!(err.is_already_closed());
        assert_eq!(hooks.tragic_events(), 1);

        let err = manager.trim_unreferenced_translog_files().unwrap_err();
        assert!(err.is_already_closed());
        assert_eq!(hooks.tragic_events(), 2);
        assert_eq!(hooks.failures().len(), 1);
    }

    #[test]
    fn test_open_failure_is_initialization_error() {
        let store = InMemoryGenerationStore::new();
        let hooks = Arc::new(RecordingEngineHooks::new());
        let first = Translog::<InMemoryGenerationStore>::new_uuid();
        TranslogManager::open(TranslogManagerArgs::new(
            "s",
            TranslogConfig::test(),
            first,
            store.clone(),
            hooks.clone(),
        ))
        .unwrap();

        let result = TranslogManager::open(TranslogManagerArgs::new(
            "s",
            TranslogConfig::test(),
            Translog::<InMemoryGenerationStore>::new_uuid(),
            store,
            hooks,
        ));
        match result {
            Err(TranslogError::Initialization { shard_id, source }) => {
                assert_eq!(shard_id, "s");
                assert!(source.is_corruption());
            }
            _ => panic!("expected initialization error"),
        }
    }

    #[test]
    fn test_persisted_checkpoint_follows_sync() {
        let tracker = Arc::new(LocalCheckpointTracker::new(NO_OPS_PERFORMED, NO_OPS_PERFORMED));
        let manager = TranslogManager::open(
            TranslogManagerArgs::new(
                "s",
                TranslogConfig::test(),
                Translog::<InMemoryGenerationStore>::new_uuid(),
                InMemoryGenerationStore::new(),
                Arc::new(RecordingEngineHooks::new()),
            )
            .with_local_checkpoint_tracker(tracker.clone()),
        )
        .unwrap();

        for _ in 0..3 {
            let seq_no = tracker.generate_seq_no();
            manager
                .translog(true)
                .unwrap()
                .add(&Operation::new(seq_no, 1, b"doc".to_vec()))
                .unwrap();
        }
        assert_eq!(tracker.persisted_checkpoint(), NO_OPS_PERFORMED);

        manager.sync_translog().unwrap();
        assert_eq!(tracker.persisted_checkpoint(), 2);
    }
}
