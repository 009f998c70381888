//! Transferable files and the completion-listener contract

use crate::transfer::error::TransferError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Identity of one local file as seen by the remote store.
///
/// Two uploads of the same name from different primary terms or
/// generations are tracked separately, and so is each retry of a failed
/// upload: the retry bumps `attempt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileIdentity {
    /// File name, e.g. `translog-7.tlog`
    pub name: String,
    pub primary_term: u64,
    pub generation: u64,
    /// Local modification time (Unix ms) when the snapshot was taken
    pub created_at_ms: u64,
    /// Upload attempt, 0 for the first
    #[serde(default)]
    pub attempt: u32,
}

impl FileIdentity {
    pub fn new(name: impl Into<String>, primary_term: u64, generation: u64) -> Self {
        FileIdentity {
            name: name.into(),
            primary_term,
            generation,
            created_at_ms: 0,
            attempt: 0,
        }
    }

    pub fn with_created_at(mut self, created_at_ms: u64) -> Self {
        self.created_at_ms = created_at_ms;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Same file, next upload attempt
    pub fn retry(&self) -> Self {
        self.clone().with_attempt(self.attempt.saturating_add(1))
    }
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[term={}, gen={}]",
            self.name, self.primary_term, self.generation
        )?;
        if self.attempt > 0 {
            write!(f, "#{}", self.attempt)?;
        }
        Ok(())
    }
}

/// Immutable contents of a file captured for upload
#[derive(Debug, Clone)]
pub struct TransferFileSnapshot {
    identity: FileIdentity,
    content: Bytes,
    checksum: u32,
}

impl TransferFileSnapshot {
    pub fn new(identity: FileIdentity, content: Bytes) -> Self {
        let checksum = crc32fast::hash(&content);
        TransferFileSnapshot {
            identity,
            content,
            checksum,
        }
    }

    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// Same content tracked under another identity
    pub fn with_identity(mut self, identity: FileIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// CRC32 of the content at capture time
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Observer of upload completion. Every upload attempt reports exactly one
/// of `on_success` / `on_failure` for its file.
///
/// An `Err` from either callback means the observer rejected the report
/// (for the tracker: an out-of-order transition) and must be surfaced.
pub trait FileTransferListener: Send + Sync {
    fn on_success(&self, file: &FileIdentity) -> Result<(), TransferError>;

    fn on_failure(&self, file: &FileIdentity, cause: &TransferError) -> Result<(), TransferError>;
}
