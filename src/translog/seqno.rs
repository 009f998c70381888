//! Sequence numbers and local checkpoint tracking
//!
//! A shard assigns every operation a monotonically increasing sequence
//! number. The local checkpoint is the highest sequence number below which
//! every operation has been seen. Two checkpoints are tracked: *processed*
//! (applied to the engine) and *persisted* (durable in the translog).

use parking_lot::Mutex;
use std::collections::BTreeSet;

/// Operation sequence number
pub type SeqNo = i64;

/// Sequence number of a shard that has seen no operations
pub const NO_OPS_PERFORMED: SeqNo = -1;

/// Sequence number not yet assigned
pub const UNASSIGNED_SEQ_NO: SeqNo = -2;

/// Snapshot of a tracker's checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqNoStats {
    pub max_seq_no: SeqNo,
    pub local_checkpoint: SeqNo,
    pub persisted_checkpoint: SeqNo,
}

struct TrackerInner {
    next_seq_no: SeqNo,
    max_seq_no: SeqNo,
    processed_checkpoint: SeqNo,
    persisted_checkpoint: SeqNo,
    /// Processed above the checkpoint, waiting for the gap to close
    processed_pending: BTreeSet<SeqNo>,
    persisted_pending: BTreeSet<SeqNo>,
}

/// Tracks processed and persisted local checkpoints for one shard
pub struct LocalCheckpointTracker {
    inner: Mutex<TrackerInner>,
}

impl LocalCheckpointTracker {
    /// Start from a known max seq no and local checkpoint (both
    /// `NO_OPS_PERFORMED` for an empty shard).
    pub fn new(max_seq_no: SeqNo, local_checkpoint: SeqNo) -> Self {
        debug_assert!(
            max_seq_no >= NO_OPS_PERFORMED,
            "Precondition: max_seq_no must be >= NO_OPS_PERFORMED"
        );
        debug_assert!(
            local_checkpoint <= max_seq_no,
            "Precondition: local_checkpoint must not exceed max_seq_no"
        );

        LocalCheckpointTracker {
            inner: Mutex::new(TrackerInner {
                next_seq_no: max_seq_no + 1,
                max_seq_no,
                processed_checkpoint: local_checkpoint,
                persisted_checkpoint: local_checkpoint,
                processed_pending: BTreeSet::new(),
                persisted_pending: BTreeSet::new(),
            }),
        }
    }

    /// Hand out the next sequence number
    pub fn generate_seq_no(&self) -> SeqNo {
        let mut inner = self.inner.lock();
        let seq_no = inner.next_seq_no;
        inner.next_seq_no = seq_no
            .checked_add(1)
            .expect("seq no overflow is unreachable");
        seq_no
    }

    /// Raise the next sequence number to at least `seq_no + 1`
    pub fn advance_max_seq_no(&self, seq_no: SeqNo) {
        let mut inner = self.inner.lock();
        if seq_no >= inner.next_seq_no {
            inner.next_seq_no = seq_no + 1;
        }
        inner.max_seq_no = inner.max_seq_no.max(seq_no);
    }

    pub fn mark_seq_no_as_processed(&self, seq_no: SeqNo) {
        let mut inner = self.inner.lock();
        inner.max_seq_no = inner.max_seq_no.max(seq_no);
        if seq_no >= inner.next_seq_no {
            inner.next_seq_no = seq_no + 1;
        }
        let TrackerInner {
            processed_checkpoint,
            processed_pending,
            ..
        } = &mut *inner;
        advance(processed_checkpoint, processed_pending, seq_no);
    }

    pub fn mark_seq_no_as_persisted(&self, seq_no: SeqNo) {
        let mut inner = self.inner.lock();
        let TrackerInner {
            persisted_checkpoint,
            persisted_pending,
            ..
        } = &mut *inner;
        advance(persisted_checkpoint, persisted_pending, seq_no);
    }

    pub fn processed_checkpoint(&self) -> SeqNo {
        self.inner.lock().processed_checkpoint
    }

    pub fn persisted_checkpoint(&self) -> SeqNo {
        self.inner.lock().persisted_checkpoint
    }

    pub fn max_seq_no(&self) -> SeqNo {
        self.inner.lock().max_seq_no
    }

    pub fn stats(&self) -> SeqNoStats {
        let inner = self.inner.lock();
        SeqNoStats {
            max_seq_no: inner.max_seq_no,
            local_checkpoint: inner.processed_checkpoint,
            persisted_checkpoint: inner.persisted_checkpoint,
        }
    }
}

/// Record `seq_no` and move the checkpoint across any now-contiguous run
fn advance(checkpoint: &mut SeqNo, pending: &mut BTreeSet<SeqNo>, seq_no: SeqNo) {
    if seq_no <= *checkpoint {
        return;
    }
    pending.insert(seq_no);
    while pending.remove(&(*checkpoint + 1)) {
        *checkpoint += 1;
    }

    debug_assert!(
        pending.iter().all(|s| *s > *checkpoint + 1),
        "Postcondition: no pending seq no may be adjacent to the checkpoint"
    );
}
