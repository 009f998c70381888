//! File Transfer Tracker
//!
//! Remembers the remote transfer state of every file a shard has tried to
//! upload. Updates for one file are serialized on its `DashMap` shard, so two
//! racing reports observe each other and the loser of an illegal race fails
//! instead of overwriting. There is no global lock.
//!
//! A file with no record is in the implicit INIT state: any first report is
//! accepted. INIT is never written.
//!
//! Records are never removed. A retry after FAILED is tracked under the next
//! `FileIdentity::attempt`.

use crate::transfer::error::TransferError;
use crate::transfer::file::{FileIdentity, FileTransferListener};
use crate::transfer::state::TransferState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

pub struct FileTransferTracker {
    shard_id: String,
    states: DashMap<FileIdentity, TransferState>,
}

impl FileTransferTracker {
    pub fn new(shard_id: impl Into<String>) -> Self {
        FileTransferTracker {
            shard_id: shard_id.into(),
            states: DashMap::new(),
        }
    }

    /// Upload of `file` completed
    pub fn on_success(&self, file: &FileIdentity) -> Result<(), TransferError> {
        self.transition(file, TransferState::Success)
    }

    /// Upload of `file` failed with `cause`
    pub fn on_failure(&self, file: &FileIdentity, cause: &TransferError) -> Result<(), TransferError> {
        warn!("[{}] upload of {} failed: {}", self.shard_id, file, cause);
        self.transition(file, TransferState::Failed)
    }

    /// Upload of `file` is about to begin
    pub fn on_started(&self, file: &FileIdentity) -> Result<(), TransferError> {
        self.transition(file, TransferState::Started)
    }

    /// Remote copy of `file` was deleted. A second delete of the same file
    /// fails, so observers count each deletion once.
    pub fn on_deleted(&self, file: &FileIdentity) -> Result<(), TransferError> {
        self.transition(file, TransferState::Deleted)
    }

    /// Current state, `None` while the file is still implicitly INIT
    pub fn state(&self, file: &FileIdentity) -> Option<TransferState> {
        self.states.get(file).map(|entry| *entry.value())
    }

    /// Newest recorded attempt of `file`, or its first attempt if none is
    /// recorded. A retry only starts after a FAILED attempt, so attempts
    /// form an unbroken chain from 0.
    pub fn latest_attempt(&self, file: &FileIdentity) -> FileIdentity {
        let mut latest = file.clone().with_attempt(0);
        while self.state(&latest) == Some(TransferState::Failed) {
            let next = latest.retry();
            if !self.states.contains_key(&next) {
                break;
            }
            latest = next;
        }
        latest
    }

    /// Files currently in `state`, sorted
    pub fn files_in_state(&self, state: TransferState) -> Vec<FileIdentity> {
        let mut files: Vec<FileIdentity> = self
            .states
            .iter()
            .filter(|entry| *entry.value() == state)
            .map(|entry| entry.key().clone())
            .collect();
        files.sort();
        files
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Atomic per-key update. On an illegal transition the entry is left
    /// untouched.
    fn transition(&self, file: &FileIdentity, target: TransferState) -> Result<(), TransferError> {
        match self.states.entry(file.clone()) {
            Entry::Vacant(entry) => {
                check_transition(file, None, target)?;
                entry.insert(target);
                debug!("[{}] {}: (none) -> {}", self.shard_id, file, target);
            }
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                check_transition(file, Some(current), target)?;
                entry.insert(target);
                debug!("[{}] {}: {} -> {}", self.shard_id, file, current, target);
            }
        }
        Ok(())
    }
}

/// Absent behaves like INIT: every target is legal
fn check_transition(
    file: &FileIdentity,
    current: Option<TransferState>,
    target: TransferState,
) -> Result<(), TransferError> {
    match current {
        None => Ok(()),
        Some(current) if current.can_transition_to(target) => Ok(()),
        Some(current) => Err(TransferError::IllegalStateTransition {
            file: file.to_string(),
            current,
            target,
        }),
    }
}

impl FileTransferListener for FileTransferTracker {
    fn on_success(&self, file: &FileIdentity) -> Result<(), TransferError> {
        FileTransferTracker::on_success(self, file)
    }

    fn on_failure(&self, file: &FileIdentity, cause: &TransferError) -> Result<(), TransferError> {
        FileTransferTracker::on_failure(self, file, cause)
    }
}
