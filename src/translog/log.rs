//! Translog - Generations, Append, Roll, Trim, Sync
//!
//! The translog is a sequence of generations. Exactly one generation, the
//! current one, accepts appends; every older generation is a sealed reader.
//!
//! ```text
//! translog-1.tlog  translog-1.ckp   sealed
//! translog-2.tlog  translog-2.ckp   sealed
//! translog-3.tlog  translog-3.ckp   current (appends land here)
//! ```
//!
//! A single mutex serialises append, roll, sync and trim bookkeeping, so an
//! operation appended before a roll returns is always in the old generation.
//! Any I/O failure while appending, syncing or rolling is a tragic event: the
//! translog closes itself and every later call fails with `AlreadyClosed`.

use crate::translog::checkpoint::{
    checkpoint_file_name, generation_file_name, parse_checkpoint_generation, Checkpoint,
};
use crate::translog::clock::{ProductionClock, TranslogClock};
use crate::translog::config::{RetentionConfig, TranslogConfig};
use crate::translog::deletion_policy::{self, DefaultDeletionPolicy, DeletionPolicy};
use crate::translog::error::TranslogError;
use crate::translog::file_store::{GenerationStore, GenerationWriter};
use crate::translog::operation::{
    decode_operations, GenerationHeader, Operation, TRANSLOG_HEADER_SIZE,
};
use crate::translog::seqno::{SeqNo, NO_OPS_PERFORMED, UNASSIGNED_SEQ_NO};
use crate::translog::snapshot::{RetentionLease, RetentionLocks, Snapshot};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

/// Receives every seq no once its generation has been synced
pub type PersistedSeqNoConsumer = Arc<dyn Fn(SeqNo) + Send + Sync>;
/// Supplies the current global checkpoint
pub type SeqNoSupplier = Arc<dyn Fn() -> SeqNo + Send + Sync>;
/// Supplies the current primary term
pub type PrimaryTermSupplier = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Position of one appended operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub generation: u64,
    pub offset: u64,
    pub size: u32,
}

impl Location {
    /// First byte past this operation
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size as u64)
    }
}

/// Metadata for one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInfo {
    pub generation: u64,
    /// Primary term when the generation was created
    pub primary_term: u64,
    pub num_ops: u64,
    pub min_seq_no: SeqNo,
    pub max_seq_no: SeqNo,
    /// File length, header included
    pub size_in_bytes: u64,
    pub last_modified_ms: u64,
    pub global_checkpoint: SeqNo,
    /// Operations above this seq no are hidden (`UNASSIGNED_SEQ_NO` = none)
    pub trimmed_above_seq_no: SeqNo,
    pub sealed: bool,
}

impl GenerationInfo {
    pub fn empty(generation: u64, primary_term: u64, now_ms: u64) -> Self {
        GenerationInfo {
            generation,
            primary_term,
            num_ops: 0,
            min_seq_no: NO_OPS_PERFORMED,
            max_seq_no: NO_OPS_PERFORMED,
            size_in_bytes: TRANSLOG_HEADER_SIZE as u64,
            last_modified_ms: now_ms,
            global_checkpoint: NO_OPS_PERFORMED,
            trimmed_above_seq_no: UNASSIGNED_SEQ_NO,
            sealed: false,
        }
    }

    /// Highest seq no a snapshot can still see in this generation
    pub fn max_effective_seq_no(&self) -> SeqNo {
        if self.trimmed_above_seq_no == UNASSIGNED_SEQ_NO {
            self.max_seq_no
        } else {
            self.max_seq_no.min(self.trimmed_above_seq_no)
        }
    }

    fn overlaps(&self, from: SeqNo, to: SeqNo) -> bool {
        self.num_ops > 0 && self.min_seq_no <= to && self.max_seq_no >= from
    }

    fn record(&mut self, seq_no: SeqNo, size_in_bytes: u64, now_ms: u64) {
        if self.num_ops == 0 {
            self.min_seq_no = seq_no;
            self.max_seq_no = seq_no;
        } else {
            self.min_seq_no = self.min_seq_no.min(seq_no);
            self.max_seq_no = self.max_seq_no.max(seq_no);
        }
        self.num_ops = self
            .num_ops
            .checked_add(1)
            .expect("operation count overflow is unreachable");
        self.size_in_bytes = size_in_bytes;
        self.last_modified_ms = now_ms;
    }

    fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        GenerationInfo {
            generation: checkpoint.generation,
            primary_term: checkpoint.primary_term,
            num_ops: checkpoint.num_ops,
            min_seq_no: checkpoint.min_seq_no,
            max_seq_no: checkpoint.max_seq_no,
            size_in_bytes: checkpoint.offset,
            last_modified_ms: checkpoint.last_modified_ms,
            global_checkpoint: checkpoint.global_checkpoint,
            trimmed_above_seq_no: checkpoint.trimmed_above_seq_no,
            sealed: true,
        }
    }
}

/// Point-in-time counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslogStats {
    pub generation_count: usize,
    pub current_generation: u64,
    pub num_operations: u64,
    pub size_in_bytes: u64,
    /// Operations not yet covered by the last safe commit
    pub uncommitted_operations: u64,
    pub uncommitted_size_in_bytes: u64,
    /// Age of the oldest retained generation
    pub earliest_last_modified_age_ms: u64,
}

/// Bytes of one sealed generation, for upload
#[derive(Debug, Clone)]
pub struct GenerationFiles {
    pub info: GenerationInfo,
    pub data_file_name: String,
    pub data: Bytes,
    pub checkpoint_file_name: String,
    pub checkpoint: Bytes,
}

/// Collaborators wired into a translog at open
pub struct TranslogDeps {
    pub deletion_policy: Arc<dyn DeletionPolicy>,
    pub clock: Arc<dyn TranslogClock>,
    pub global_checkpoint_supplier: SeqNoSupplier,
    pub primary_term_supplier: PrimaryTermSupplier,
    pub persisted_seq_no_consumer: Option<PersistedSeqNoConsumer>,
}

impl TranslogDeps {
    pub fn new(deletion_policy: Arc<dyn DeletionPolicy>) -> Self {
        TranslogDeps {
            deletion_policy,
            clock: Arc::new(ProductionClock::new()),
            global_checkpoint_supplier: Arc::new(|| NO_OPS_PERFORMED),
            primary_term_supplier: Arc::new(|| 1),
            persisted_seq_no_consumer: None,
        }
    }
}

impl Default for TranslogDeps {
    fn default() -> Self {
        Self::new(Arc::new(DefaultDeletionPolicy::new(RetentionConfig::none())))
    }
}

struct CurrentGeneration<W> {
    writer: W,
    info: GenerationInfo,
    synced_offset: u64,
    /// Appended but not yet synced
    unsynced_seq_nos: Vec<SeqNo>,
}

struct Closed {
    reason: String,
    tragic: Option<String>,
}

struct TranslogState<W> {
    /// Sealed generations, ascending
    readers: Vec<GenerationInfo>,
    current: CurrentGeneration<W>,
    closed: Option<Closed>,
    last_synced_global_checkpoint: SeqNo,
}

/// Write-ahead log for one shard
pub struct Translog<S: GenerationStore> {
    shard_id: String,
    store: S,
    translog_uuid: Uuid,
    generation_threshold_size: u64,
    deps: TranslogDeps,
    retention_locks: Arc<RetentionLocks>,
    state: Mutex<TranslogState<S::Writer>>,
}

impl<S: GenerationStore> Translog<S> {
    /// Fresh translog UUID for a new shard
    pub fn new_uuid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Open the translog in `store`, or create it if the store is empty.
    /// Existing generations become sealed readers; appends go to a new
    /// generation one past the newest.
    pub fn open(
        shard_id: &str,
        config: &TranslogConfig,
        translog_uuid: &str,
        store: S,
        deps: TranslogDeps,
    ) -> Result<Self, TranslogError> {
        let uuid = Uuid::parse_str(translog_uuid).map_err(|e| {
            TranslogError::Corrupted(format!("invalid translog uuid {}: {}", translog_uuid, e))
        })?;

        let readers = load_readers(&store, &uuid)?;
        let next_generation = readers
            .last()
            .map(|r| {
                r.generation
                    .checked_add(1)
                    .expect("generation overflow is unreachable")
            })
            .unwrap_or(1);

        let current = create_generation(&store, &deps, &uuid, next_generation)?;
        let last_synced_global_checkpoint = current.info.global_checkpoint;

        info!(
            "[{}] opened translog {} at generation {} ({} sealed generations)",
            shard_id,
            translog_uuid,
            next_generation,
            readers.len()
        );

        Ok(Translog {
            shard_id: shard_id.to_string(),
            store,
            translog_uuid: uuid,
            generation_threshold_size: config.generation_threshold_size,
            deps,
            retention_locks: Arc::new(RetentionLocks::new()),
            state: Mutex::new(TranslogState {
                readers,
                current,
                closed: None,
                last_synced_global_checkpoint,
            }),
        })
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn translog_uuid(&self) -> String {
        self.translog_uuid.to_string()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn deletion_policy(&self) -> &Arc<dyn DeletionPolicy> {
        &self.deps.deletion_policy
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().closed.is_none()
    }

    /// Cause of the tragic event that closed this translog, if any
    pub fn tragic_exception(&self) -> Option<String> {
        self.state
            .lock()
            .closed
            .as_ref()
            .and_then(|c| c.tragic.clone())
    }

    pub fn ensure_open(&self) -> Result<(), TranslogError> {
        ensure_open_locked(&self.state.lock())
    }

    /// Append one operation to the current generation (does NOT fsync)
    pub fn add(&self, operation: &Operation) -> Result<Location, TranslogError> {
        debug_assert!(
            operation.seq_no >= 0,
            "Precondition: appended operations must carry an assigned seq no"
        );

        let record = operation.encode()?;
        let size = u32::try_from(record.len()).map_err(|_| {
            TranslogError::Corrupted(format!("record too large: {} bytes", record.len()))
        })?;

        let mut state = self.state.lock();
        ensure_open_locked(&state)?;

        let generation = state.current.info.generation;
        let offset = state.current.writer.size();
        let new_size = match state.current.writer.append(&record) {
            Ok(new_size) => new_size,
            Err(e) => {
                let err = TranslogError::from(e);
                self.close_on_tragic_event(&mut state, &err);
                return Err(err);
            }
        };

        let now_ms = self.deps.clock.now_ms();
        state.current.info.record(operation.seq_no, new_size, now_ms);
        state.current.unsynced_seq_nos.push(operation.seq_no);

        let location = Location {
            generation,
            offset,
            size,
        };
        debug_assert_eq!(
            location.end(),
            new_size,
            "Postcondition: location must end at the new file size"
        );
        Ok(location)
    }

    pub fn current_generation(&self) -> u64 {
        self.state.lock().current.info.generation
    }

    /// Location one past the last appended byte of the current generation
    pub fn last_write_location(&self) -> Location {
        let state = self.state.lock();
        Location {
            generation: state.current.info.generation,
            offset: state.current.writer.size(),
            size: 0,
        }
    }

    /// True when the current generation has grown past the roll threshold
    pub fn should_roll_generation(&self) -> bool {
        self.state.lock().current.writer.size() > self.generation_threshold_size
    }

    /// True when unsynced bytes exist or the global checkpoint moved since
    /// the last sync
    pub fn sync_needed(&self) -> bool {
        let state = self.state.lock();
        if state.closed.is_some() {
            return false;
        }
        state.current.writer.size() > state.current.synced_offset
            || (self.deps.global_checkpoint_supplier)() > state.last_synced_global_checkpoint
    }

    /// Fsync the current generation and rewrite its checkpoint
    pub fn sync(&self) -> Result<(), TranslogError> {
        let persisted = {
            let mut state = self.state.lock();
            ensure_open_locked(&state)?;
            self.sync_locked(&mut state)?
        };
        self.notify_persisted(persisted);
        Ok(())
    }

    /// Sync only if some location is not yet durable. Returns whether a sync
    /// happened.
    pub fn ensure_synced(&self, locations: &[Location]) -> Result<bool, TranslogError> {
        let max = match locations.iter().max() {
            Some(max) => *max,
            None => return Ok(false),
        };

        let persisted = {
            let mut state = self.state.lock();
            ensure_open_locked(&state)?;
            debug_assert!(
                max.generation <= state.current.info.generation,
                "Precondition: locations cannot come from a future generation"
            );

            if max.generation == state.current.info.generation
                && max.end() > state.current.synced_offset
            {
                Some(self.sync_locked(&mut state)?)
            } else {
                None
            }
        };

        match persisted {
            Some(seq_nos) => {
                self.notify_persisted(seq_nos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Seal the current generation and start a new one. Returns the new
    /// generation number.
    pub fn roll_generation(&self) -> Result<u64, TranslogError> {
        let (next_generation, persisted) = {
            let mut state = self.state.lock();
            ensure_open_locked(&state)?;

            let persisted = self.sync_locked(&mut state)?;
            let next_generation = state
                .current
                .info
                .generation
                .checked_add(1)
                .expect("generation overflow is unreachable");

            let created =
                create_generation(&self.store, &self.deps, &self.translog_uuid, next_generation);
            let next = match created {
                Ok(next) => next,
                Err(e) => {
                    self.close_on_tragic_event(&mut state, &e);
                    return Err(e);
                }
            };

            let previous = std::mem::replace(&mut state.current, next);
            let mut sealed = previous.info;
            sealed.sealed = true;
            sealed.size_in_bytes = previous.synced_offset;
            state.readers.push(sealed);

            debug_assert!(
                state
                    .readers
                    .windows(2)
                    .all(|w| w[0].generation + 1 == w[1].generation),
                "Postcondition: sealed generations must be contiguous"
            );
            (next_generation, persisted)
        };

        self.notify_persisted(persisted);
        debug!(
            "[{}] rolled translog to generation {}",
            self.shard_id, next_generation
        );
        Ok(next_generation)
    }

    /// Delete sealed generations the deletion policy and open snapshots no
    /// longer need. Returns the number of generations deleted.
    pub fn trim_unreferenced_readers(&self) -> Result<usize, TranslogError> {
        let mut state = self.state.lock();
        ensure_open_locked(&state)?;

        let now_ms = self.deps.clock.now_ms();
        let mut min_generation = self.deps.deletion_policy.min_generation_to_retain(
            &state.readers,
            &state.current.info,
            now_ms,
        );
        if let Some(locked) = self.retention_locks.min_locked_generation() {
            min_generation = min_generation.min(locked);
        }

        let mut deleted = 0;
        while let Some(oldest) = state.readers.first() {
            if oldest.generation >= min_generation {
                break;
            }
            let generation = oldest.generation;
            // Checkpoint first: a data file without one is ignored on reopen
            let result = self
                .store
                .delete(&checkpoint_file_name(generation))
                .and_then(|_| self.store.delete(&generation_file_name(generation)));
            if let Err(e) = result {
                let err = TranslogError::from(e);
                self.close_on_tragic_event(&mut state, &err);
                return Err(err);
            }
            state.readers.remove(0);
            deleted += 1;
        }

        if deleted > 0 {
            debug!(
                "[{}] trimmed {} translog generations (min retained {})",
                self.shard_id, deleted, min_generation
            );
        }
        Ok(deleted)
    }

    /// Roll, then hide operations above `above_seq_no` in every sealed
    /// generation created under a primary term below `below_term`
    ///
    /// Returns the new current generation.
    pub fn trim_operations(
        &self,
        below_term: u64,
        above_seq_no: SeqNo,
    ) -> Result<u64, TranslogError> {
        debug_assert!(
            above_seq_no >= NO_OPS_PERFORMED,
            "Precondition: above_seq_no must be >= NO_OPS_PERFORMED"
        );

        let generation = self.roll_generation()?;

        let mut state = self.state.lock();
        ensure_open_locked(&state)?;

        let result = self.mark_trimmed(&mut state.readers, below_term, above_seq_no);
        if let Err(err) = result {
            self.close_on_tragic_event(&mut state, &err);
            return Err(err);
        }
        Ok(generation)
    }

    /// Snapshot of operations with `from <= seq_no <= to`, newest copy of each
    /// seq no winning
    pub fn new_snapshot(&self, from: SeqNo, to: SeqNo) -> Result<Snapshot, TranslogError> {
        let (generations, lease) = {
            let state = self.state.lock();
            ensure_open_locked(&state)?;

            let mut current = state.current.info.clone();
            current.size_in_bytes = state.current.writer.size();

            let generations: Vec<GenerationInfo> = state
                .readers
                .iter()
                .cloned()
                .chain(std::iter::once(current))
                .filter(|g| g.overlaps(from, to))
                .collect();
            let oldest = generations
                .first()
                .map(|g| g.generation)
                .unwrap_or(state.current.info.generation);
            (generations, self.retention_locks.acquire(oldest))
        };

        let mut seen = HashSet::new();
        let mut operations = Vec::new();
        let mut skipped = 0usize;

        for info in generations.iter().rev() {
            let ops = self.read_generation(info)?;
            for op in ops.into_iter().rev() {
                if info.trimmed_above_seq_no != UNASSIGNED_SEQ_NO
                    && op.seq_no > info.trimmed_above_seq_no
                {
                    skipped += 1;
                    continue;
                }
                if op.seq_no < from || op.seq_no > to {
                    continue;
                }
                if seen.insert(op.seq_no) {
                    operations.push(op);
                } else {
                    skipped += 1;
                }
            }
        }

        trace!(
            "[{}] snapshot [{}, {}] over {} generations: {} operations, {} skipped",
            self.shard_id,
            from,
            to,
            generations.len(),
            operations.len(),
            skipped
        );
        Ok(Snapshot::new(operations, skipped, lease))
    }

    /// Oldest generation holding an operation at or above `seq_no`
    pub fn min_generation_for_seq_no(&self, seq_no: SeqNo) -> u64 {
        let state = self.state.lock();
        deletion_policy::min_generation_for_seq_no(&state.readers, &state.current.info, seq_no)
    }

    pub fn stats(&self) -> TranslogStats {
        let state = self.state.lock();
        let mut current = state.current.info.clone();
        current.size_in_bytes = state.current.writer.size();

        let committed_seq_no = self.deps.deletion_policy.local_checkpoint_of_safe_commit();
        let min_uncommitted = deletion_policy::min_generation_for_seq_no(
            &state.readers,
            &current,
            committed_seq_no.saturating_add(1),
        );
        let now_ms = self.deps.clock.now_ms();

        let oldest_modified_ms = state
            .readers
            .first()
            .map(|r| r.last_modified_ms)
            .unwrap_or(current.last_modified_ms);

        let mut stats = TranslogStats {
            generation_count: state.readers.len() + 1,
            current_generation: current.generation,
            earliest_last_modified_age_ms: now_ms.saturating_sub(oldest_modified_ms),
            ..Default::default()
        };

        for info in state.readers.iter().chain(std::iter::once(&current)) {
            stats.num_operations += info.num_ops;
            stats.size_in_bytes += info.size_in_bytes;
            if info.generation >= min_uncommitted {
                stats.uncommitted_operations += info.num_ops;
                stats.uncommitted_size_in_bytes += info.size_in_bytes;
            }
        }
        stats
    }

    /// Metadata of every sealed generation, ascending
    pub fn sealed_generations(&self) -> Vec<GenerationInfo> {
        self.state.lock().readers.clone()
    }

    /// Durable bytes of one sealed generation and its checkpoint
    pub fn generation_files(&self, generation: u64) -> Result<GenerationFiles, TranslogError> {
        let (info, _lease) = {
            let state = self.state.lock();
            ensure_open_locked(&state)?;
            let info = state
                .readers
                .iter()
                .find(|r| r.generation == generation)
                .cloned()
                .ok_or_else(|| {
                    TranslogError::Io(IoError::new(
                        ErrorKind::NotFound,
                        format!("no sealed translog generation {}", generation),
                    ))
                })?;
            (info, self.retention_locks.acquire(generation))
        };

        let data_file_name = generation_file_name(generation);
        let checkpoint_file_name = checkpoint_file_name(generation);
        let mut data = self.store.read(&data_file_name)?;
        data.truncate(info.size_in_bytes as usize);
        let checkpoint = self.store.read(&checkpoint_file_name)?;

        Ok(GenerationFiles {
            info,
            data_file_name,
            data: Bytes::from(data),
            checkpoint_file_name,
            checkpoint: Bytes::from(checkpoint),
        })
    }

    /// Sync and close. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), TranslogError> {
        let persisted = {
            let mut state = self.state.lock();
            if state.closed.is_some() {
                return Ok(());
            }
            let persisted = self.sync_locked(&mut state);
            state.closed = Some(Closed {
                reason: "translog is closed".to_string(),
                tragic: None,
            });
            persisted?
        };
        self.notify_persisted(persisted);
        info!("[{}] closed translog", self.shard_id);
        Ok(())
    }

    /// Retention locks held by open snapshots
    pub fn retention_locks(&self) -> &Arc<RetentionLocks> {
        &self.retention_locks
    }

    /// Protect `generation` and newer from trimming until the lease drops
    pub fn acquire_retention_lock(&self, generation: u64) -> RetentionLease {
        self.retention_locks.acquire(generation)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Returns the seq nos that just became durable
    fn sync_locked(
        &self,
        state: &mut TranslogState<S::Writer>,
    ) -> Result<Vec<SeqNo>, TranslogError> {
        let global_checkpoint = (self.deps.global_checkpoint_supplier)();

        if let Err(e) = state.current.writer.sync() {
            let err = TranslogError::from(e);
            self.close_on_tragic_event(state, &err);
            return Err(err);
        }

        let offset = state.current.writer.size();
        state.current.info.global_checkpoint = global_checkpoint;
        state.current.info.size_in_bytes = offset;
        let written =
            write_checkpoint(&self.store, &self.translog_uuid, &state.current.info, offset);
        if let Err(err) = written {
            self.close_on_tragic_event(state, &err);
            return Err(err);
        }

        state.current.synced_offset = offset;
        state.last_synced_global_checkpoint = global_checkpoint;
        Ok(std::mem::take(&mut state.current.unsynced_seq_nos))
    }

    fn mark_trimmed(
        &self,
        readers: &mut [GenerationInfo],
        below_term: u64,
        above_seq_no: SeqNo,
    ) -> Result<(), TranslogError> {
        for reader in readers.iter_mut().filter(|r| r.primary_term < below_term) {
            let narrows = above_seq_no < reader.max_seq_no
                && (reader.trimmed_above_seq_no == UNASSIGNED_SEQ_NO
                    || above_seq_no < reader.trimmed_above_seq_no);
            if !narrows {
                continue;
            }
            reader.trimmed_above_seq_no = above_seq_no;
            write_checkpoint(
                &self.store,
                &self.translog_uuid,
                reader,
                reader.size_in_bytes,
            )?;
            debug!(
                "[{}] trimmed generation {} above seq no {}",
                self.shard_id, reader.generation, above_seq_no
            );
        }
        Ok(())
    }

    /// Decode a generation up to its recorded size, verifying the op count
    fn read_generation(&self, info: &GenerationInfo) -> Result<Vec<Operation>, TranslogError> {
        let data = self.store.read(&generation_file_name(info.generation))?;
        let header = GenerationHeader::decode(&data)?;
        if header.generation != info.generation || header.translog_uuid != self.translog_uuid {
            return Err(TranslogError::Corrupted(format!(
                "generation {} header does not match (found generation {})",
                info.generation, header.generation
            )));
        }

        let ops = decode_operations(&data, info.size_in_bytes as usize);
        if (ops.len() as u64) < info.num_ops {
            return Err(TranslogError::Corrupted(format!(
                "generation {} has {} readable operations, checkpoint expects {}",
                info.generation,
                ops.len(),
                info.num_ops
            )));
        }
        Ok(ops)
    }

    fn close_on_tragic_event(&self, state: &mut TranslogState<S::Writer>, err: &TranslogError) {
        if state.closed.is_some() {
            return;
        }
        error!(
            "[{}] closing translog on tragic event: {}",
            self.shard_id, err
        );
        state.closed = Some(Closed {
            reason: "translog closed after a tragic event".to_string(),
            tragic: Some(err.to_string()),
        });
    }

    fn notify_persisted(&self, seq_nos: Vec<SeqNo>) {
        if let Some(consumer) = &self.deps.persisted_seq_no_consumer {
            for seq_no in seq_nos {
                consumer(seq_no);
            }
        }
    }
}

fn ensure_open_locked<W>(state: &TranslogState<W>) -> Result<(), TranslogError> {
    match &state.closed {
        Some(closed) => Err(TranslogError::AlreadyClosed {
            reason: closed.reason.clone(),
            tragic: closed.tragic.clone(),
        }),
        None => Ok(()),
    }
}

fn create_generation<S: GenerationStore>(
    store: &S,
    deps: &TranslogDeps,
    translog_uuid: &Uuid,
    generation: u64,
) -> Result<CurrentGeneration<S::Writer>, TranslogError> {
    let primary_term = (deps.primary_term_supplier)();
    let header = GenerationHeader {
        generation,
        primary_term,
        translog_uuid: *translog_uuid,
    };

    let mut writer = store.create(&generation_file_name(generation))?;
    writer.append(&header.encode())?;
    writer.sync()?;

    let mut info = GenerationInfo::empty(generation, primary_term, deps.clock.now_ms());
    info.global_checkpoint = (deps.global_checkpoint_supplier)();
    write_checkpoint(store, translog_uuid, &info, writer.size())?;

    Ok(CurrentGeneration {
        synced_offset: writer.size(),
        writer,
        info,
        unsynced_seq_nos: Vec::new(),
    })
}

fn write_checkpoint<S: GenerationStore>(
    store: &S,
    translog_uuid: &Uuid,
    info: &GenerationInfo,
    offset: u64,
) -> Result<(), TranslogError> {
    let checkpoint = Checkpoint {
        generation: info.generation,
        num_ops: info.num_ops,
        offset,
        min_seq_no: info.min_seq_no,
        max_seq_no: info.max_seq_no,
        global_checkpoint: info.global_checkpoint,
        trimmed_above_seq_no: info.trimmed_above_seq_no,
        primary_term: info.primary_term,
        translog_uuid: translog_uuid.to_string(),
        last_modified_ms: info.last_modified_ms,
    };
    store.write_atomic(&checkpoint_file_name(info.generation), &checkpoint.to_bytes()?)?;
    Ok(())
}

/// Read every checkpointed generation, verifying headers and op counts
fn load_readers<S: GenerationStore>(
    store: &S,
    uuid: &Uuid,
) -> Result<Vec<GenerationInfo>, TranslogError> {
    let mut generations: Vec<u64> = store
        .list()?
        .iter()
        .filter_map(|name| parse_checkpoint_generation(name))
        .collect();
    generations.sort_unstable();

    let mut readers: Vec<GenerationInfo> = Vec::with_capacity(generations.len());
    for generation in generations {
        let checkpoint = Checkpoint::from_bytes(&store.read(&checkpoint_file_name(generation))?)?;
        if checkpoint.translog_uuid != uuid.to_string() {
            return Err(TranslogError::Corrupted(format!(
                "translog uuid mismatch in generation {}: expected {}, found {}",
                generation, uuid, checkpoint.translog_uuid
            )));
        }
        if checkpoint.generation != generation {
            return Err(TranslogError::Corrupted(format!(
                "checkpoint file for generation {} records generation {}",
                generation, checkpoint.generation
            )));
        }
        if let Some(previous) = readers.last() {
            if previous.generation + 1 != generation {
                return Err(TranslogError::Corrupted(format!(
                    "missing translog generation between {} and {}",
                    previous.generation, generation
                )));
            }
        }

        let data = store.read(&generation_file_name(generation))?;
        let header = GenerationHeader::decode(&data)?;
        if header.generation != generation || header.translog_uuid != *uuid {
            return Err(TranslogError::Corrupted(format!(
                "generation {} header does not match its checkpoint",
                generation
            )));
        }
        if (data.len() as u64) < checkpoint.offset {
            return Err(TranslogError::Corrupted(format!(
                "generation {} is {} bytes, checkpoint expects {}",
                generation,
                data.len(),
                checkpoint.offset
            )));
        }
        let ops = decode_operations(&data, checkpoint.offset as usize);
        if (ops.len() as u64) < checkpoint.num_ops {
            return Err(TranslogError::Corrupted(format!(
                "generation {} has {} readable operations, checkpoint expects {}",
                generation,
                ops.len(),
                checkpoint.num_ops
            )));
        }

        readers.push(GenerationInfo::from_checkpoint(&checkpoint));
    }
    Ok(readers)
}
