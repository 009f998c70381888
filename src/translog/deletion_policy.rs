//! Translog deletion policy
//!
//! Decides the oldest generation that must be kept. Everything older is
//! deleted by `Translog::trim_unreferenced_readers`, subject to retention
//! locks held by open snapshots.
//!
//! ```text
//! min_to_retain = min(max(by_age_and_size, by_total_files), min_for_recovery)
//! ```
//!
//! `by_age_and_size` is `u64::MAX` when both limits are disabled, so only
//! recovery needs and the file cap apply.

use crate::translog::config::RetentionConfig;
use crate::translog::log::GenerationInfo;
use crate::translog::seqno::{SeqNo, NO_OPS_PERFORMED};
use std::sync::atomic::{AtomicI64, Ordering};

pub trait DeletionPolicy: Send + Sync {
    /// Oldest generation to keep. `readers` are sealed generations in
    /// ascending order; `writer` is the current generation.
    fn min_generation_to_retain(
        &self,
        readers: &[GenerationInfo],
        writer: &GenerationInfo,
        now_ms: u64,
    ) -> u64;

    /// Record the local checkpoint of the newest safe commit. Operations at
    /// or below it no longer need the translog for recovery.
    fn set_local_checkpoint_of_safe_commit(&self, local_checkpoint: SeqNo);

    fn local_checkpoint_of_safe_commit(&self) -> SeqNo;
}

/// Retention by size, age and file count plus recovery needs
pub struct DefaultDeletionPolicy {
    retention: RetentionConfig,
    local_checkpoint_of_safe_commit: AtomicI64,
}

impl DefaultDeletionPolicy {
    pub fn new(retention: RetentionConfig) -> Self {
        DefaultDeletionPolicy {
            retention,
            local_checkpoint_of_safe_commit: AtomicI64::new(NO_OPS_PERFORMED),
        }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }
}

impl DeletionPolicy for DefaultDeletionPolicy {
    fn min_generation_to_retain(
        &self,
        readers: &[GenerationInfo],
        writer: &GenerationInfo,
        now_ms: u64,
    ) -> u64 {
        let by_age = self
            .retention
            .age
            .map(|age| min_generation_by_age(readers, writer, age.as_millis() as u64, now_ms));
        let by_size = self
            .retention
            .size_bytes
            .map(|size| min_generation_by_size(readers, writer, size));

        let by_age_and_size = match (by_age, by_size) {
            (None, None) => u64::MAX,
            (Some(age), None) => age,
            (None, Some(size)) => size,
            (Some(age), Some(size)) => age.max(size),
        };
        let by_total_files =
            min_generation_by_total_files(readers, writer, self.retention.total_files);
        let for_recovery = min_generation_for_seq_no(
            readers,
            writer,
            self.local_checkpoint_of_safe_commit() + 1,
        );

        let result = by_age_and_size.max(by_total_files).min(for_recovery);

        debug_assert!(
            result <= writer.generation,
            "Postcondition: the current generation is always retained"
        );
        result
    }

    fn set_local_checkpoint_of_safe_commit(&self, local_checkpoint: SeqNo) {
        self.local_checkpoint_of_safe_commit
            .fetch_max(local_checkpoint, Ordering::SeqCst);
    }

    fn local_checkpoint_of_safe_commit(&self) -> SeqNo {
        self.local_checkpoint_of_safe_commit.load(Ordering::SeqCst)
    }
}

/// Walk newest to oldest, keeping readers while the running total (starting
/// with the writer) stays within `retention_bytes`
pub fn min_generation_by_size(
    readers: &[GenerationInfo],
    writer: &GenerationInfo,
    retention_bytes: u64,
) -> u64 {
    let mut total = writer.size_in_bytes;
    let mut min_gen = writer.generation;
    for reader in readers.iter().rev() {
        total = total.saturating_add(reader.size_in_bytes);
        if total > retention_bytes {
            break;
        }
        min_gen = reader.generation;
    }
    min_gen
}

/// First reader young enough to keep, else the writer
pub fn min_generation_by_age(
    readers: &[GenerationInfo],
    writer: &GenerationInfo,
    max_age_ms: u64,
    now_ms: u64,
) -> u64 {
    readers
        .iter()
        .find(|r| now_ms.saturating_sub(r.last_modified_ms) <= max_age_ms)
        .map(|r| r.generation)
        .unwrap_or(writer.generation)
}

/// Keep at most `max_total_files` generations, counting the writer
pub fn min_generation_by_total_files(
    readers: &[GenerationInfo],
    writer: &GenerationInfo,
    max_total_files: usize,
) -> u64 {
    let mut total_files = 1;
    let mut min_gen = writer.generation;
    for reader in readers.iter().rev() {
        if total_files >= max_total_files {
            break;
        }
        total_files += 1;
        min_gen = reader.generation;
    }
    min_gen
}

/// Oldest generation holding an operation at or above `seq_no`, else the writer
pub fn min_generation_for_seq_no(
    readers: &[GenerationInfo],
    writer: &GenerationInfo,
    seq_no: SeqNo,
) -> u64 {
    readers
        .iter()
        .chain(std::iter::once(writer))
        .filter(|g| g.max_effective_seq_no() >= seq_no)
        .map(|g| g.generation)
        .min()
        .unwrap_or(writer.generation)
}
