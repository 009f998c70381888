//! Point-in-time snapshots over a sequence-number range
//!
//! A snapshot is materialised when it is opened and yields operations in
//! ascending sequence-number order. It holds a retention lease on the oldest
//! generation it read until it is dropped, so trimming cannot delete those
//! files underneath an in-flight recovery or upload.

use crate::translog::operation::Operation;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Generation reference counts held by open snapshots
#[derive(Debug, Default)]
pub struct RetentionLocks {
    held: Mutex<BTreeMap<u64, usize>>,
}

impl RetentionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `generation` and everything newer until the lease is dropped
    pub fn acquire(self: &Arc<Self>, generation: u64) -> RetentionLease {
        let mut held = self.held.lock();
        let count = held.entry(generation).or_insert(0);
        *count = count
            .checked_add(1)
            .expect("retention lock count overflow is unreachable");
        RetentionLease {
            locks: Arc::clone(self),
            generation,
        }
    }

    /// Oldest generation any lease protects
    pub fn min_locked_generation(&self) -> Option<u64> {
        self.held.lock().keys().next().copied()
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().values().sum()
    }

    fn release(&self, generation: u64) {
        let mut held = self.held.lock();
        match held.get_mut(&generation) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                held.remove(&generation);
            }
            None => debug_assert!(false, "released a retention lock that was never acquired"),
        }
    }
}

/// Released on drop
#[derive(Debug)]
pub struct RetentionLease {
    locks: Arc<RetentionLocks>,
    generation: u64,
}

impl RetentionLease {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RetentionLease {
    fn drop(&mut self) {
        self.locks.release(self.generation);
    }
}

/// Closable ascending iterator over translog operations
#[derive(Debug)]
pub struct Snapshot {
    operations: std::vec::IntoIter<Operation>,
    total: usize,
    skipped: usize,
    lease: Option<RetentionLease>,
}

impl Snapshot {
    pub(crate) fn new(
        mut operations: Vec<Operation>,
        skipped: usize,
        lease: RetentionLease,
    ) -> Self {
        operations.sort_by_key(|op| op.seq_no);

        debug_assert!(
            operations.windows(2).all(|w| w[0].seq_no < w[1].seq_no),
            "Postcondition: snapshot seq nos must be strictly ascending"
        );

        let total = operations.len();
        Snapshot {
            operations: operations.into_iter(),
            total,
            skipped,
            lease: Some(lease),
        }
    }

    /// Number of operations this snapshot yields in total
    pub fn total_operations(&self) -> usize {
        self.total
    }

    /// Operations dropped because a newer copy existed or they were trimmed
    pub fn skipped_operations(&self) -> usize {
        self.skipped
    }

    /// Release the retention lease early; remaining operations stay readable
    pub fn close(&mut self) {
        self.lease = None;
    }

    pub fn is_closed(&self) -> bool {
        self.lease.is_none()
    }
}

impl Iterator for Snapshot {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        self.operations.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.operations.size_hint()
    }
}
