//! Translog Uploader
//!
//! Ships sealed translog generations (`translog-{gen}.tlog` plus its
//! `.ckp`) to remote storage and keeps the shard's `FileTransferTracker` in
//! step with every attempt.
//!
//! Per file:
//! ```text
//! SUCCESS / STARTED / DELETED ──► skip
//! FAILED ──► retry as the next attempt; the FAILED record stays
//! (none) ──► STARTED ──► upload ──► SUCCESS | FAILED
//! ```

use crate::transfer::error::TransferError;
use crate::transfer::file::{FileIdentity, TransferFileSnapshot};
use crate::transfer::service::{RemotePath, TransferService};
use crate::transfer::state::TransferState;
use crate::transfer::tracker::FileTransferTracker;
use crate::translog::checkpoint::{checkpoint_file_name, generation_file_name};
use crate::translog::file_store::GenerationStore;
use crate::translog::log::{GenerationFiles, Translog};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome counters of one upload pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl UploadSummary {
    fn merge(&mut self, other: UploadSummary) {
        self.uploaded = self.uploaded.saturating_add(other.uploaded);
        self.failed = self.failed.saturating_add(other.failed);
        self.skipped = self.skipped.saturating_add(other.skipped);
    }
}

pub struct TranslogUploader<T: TransferService> {
    shard_id: String,
    service: Arc<T>,
    tracker: Arc<FileTransferTracker>,
    remote_path: RemotePath,
}

impl<T: TransferService> TranslogUploader<T> {
    pub fn new(
        shard_id: impl Into<String>,
        service: Arc<T>,
        tracker: Arc<FileTransferTracker>,
        remote_path: RemotePath,
    ) -> Self {
        TranslogUploader {
            shard_id: shard_id.into(),
            service,
            tracker,
            remote_path,
        }
    }

    pub fn tracker(&self) -> &Arc<FileTransferTracker> {
        &self.tracker
    }

    pub fn remote_path(&self) -> &RemotePath {
        &self.remote_path
    }

    /// Upload every sealed generation not yet uploaded, one file at a time.
    ///
    /// Upload failures are reported to the tracker and counted, not
    /// returned. Errors are a local read failure or the tracker rejecting a
    /// transition.
    ///
    /// Each file is claimed right before its own upload, so an error leaves
    /// the files after it unclaimed for the next pass.
    pub async fn upload_sealed_generations<S: GenerationStore>(
        &self,
        translog: &Translog<S>,
    ) -> Result<UploadSummary, TransferError> {
        let mut summary = UploadSummary::default();
        for snapshot in self.sealed_snapshots(translog)? {
            let Some(snapshot) = self.claim(snapshot)? else {
                summary.skipped = summary.skipped.saturating_add(1);
                continue;
            };
            let outcome = self
                .service
                .upload_file(&snapshot, &self.remote_path)
                .await;
            match outcome {
                Ok(()) => {
                    self.tracker.on_success(snapshot.identity())?;
                    summary.uploaded = summary.uploaded.saturating_add(1);
                }
                Err(e) => {
                    self.tracker.on_failure(snapshot.identity(), &e)?;
                    summary.failed = summary.failed.saturating_add(1);
                }
            }
        }
        self.log_summary(&summary);
        Ok(summary)
    }

    /// Same as `upload_sealed_generations`, but all files go up
    /// concurrently and the service reports each outcome to the tracker.
    ///
    /// Every claimed file ends in SUCCESS or FAILED before this returns,
    /// even when its upload task dies.
    pub async fn upload_sealed_generations_async<S: GenerationStore>(
        &self,
        translog: &Translog<S>,
    ) -> Result<UploadSummary, TransferError> {
        let mut summary = UploadSummary::default();
        let mut claimed = Vec::new();
        for snapshot in self.sealed_snapshots(translog)? {
            match self.claim(snapshot) {
                Ok(Some(snapshot)) => claimed.push(snapshot),
                Ok(None) => summary.skipped = summary.skipped.saturating_add(1),
                Err(e) => {
                    for snapshot in &claimed {
                        self.abandon(snapshot.identity(), &e);
                    }
                    return Err(e);
                }
            }
        }

        let handles: Vec<_> = claimed
            .into_iter()
            .map(|snapshot| {
                let identity = snapshot.identity().clone();
                let handle = self.service.upload_file_async(
                    snapshot,
                    self.remote_path.clone(),
                    self.tracker.clone(),
                );
                (identity, handle)
            })
            .collect();

        let mut rejected = None;
        for (identity, handle) in handles {
            match handle.await {
                Ok(Ok(())) => summary.uploaded = summary.uploaded.saturating_add(1),
                Ok(Err(e)) if e.is_illegal_transition() => {
                    rejected.get_or_insert(e);
                }
                Ok(Err(_)) => summary.failed = summary.failed.saturating_add(1),
                Err(e) => {
                    let cause = TransferError::Io(IoError::new(
                        ErrorKind::Other,
                        format!("upload task: {}", e),
                    ));
                    self.abandon(&identity, &cause);
                    summary.failed = summary.failed.saturating_add(1);
                }
            }
        }
        if let Some(e) = rejected {
            return Err(e);
        }
        self.log_summary(&summary);
        Ok(summary)
    }

    /// Generations with both files present remotely
    pub async fn remote_generations(&self) -> Result<BTreeSet<u64>, TransferError> {
        let names = self
            .service
            .list_files_by_prefix("translog-", &self.remote_path)
            .await?;
        Ok(names
            .iter()
            .filter_map(|name| parse_data_generation(name))
            .filter(|generation| names.contains(&checkpoint_file_name(*generation)))
            .collect())
    }

    /// Remote `(data, checkpoint)` bytes of one generation
    pub async fn fetch_generation(&self, generation: u64) -> Result<(Bytes, Bytes), TransferError> {
        let data = self
            .service
            .read_file(&generation_file_name(generation), &self.remote_path)
            .await?;
        let checkpoint = self
            .service
            .read_file(&checkpoint_file_name(generation), &self.remote_path)
            .await?;
        Ok((data, checkpoint))
    }

    /// Snapshots of every sealed file, read before anything is claimed so a
    /// read failure leaves no file in STARTED
    fn sealed_snapshots<S: GenerationStore>(
        &self,
        translog: &Translog<S>,
    ) -> Result<Vec<TransferFileSnapshot>, TransferError> {
        let mut snapshots = Vec::new();
        for info in translog.sealed_generations() {
            let files = translog.generation_files(info.generation).map_err(|e| {
                TransferError::Io(IoError::new(
                    ErrorKind::Other,
                    format!("reading translog generation {}: {}", info.generation, e),
                ))
            })?;
            snapshots.extend(snapshots_of(&files));
        }
        Ok(snapshots)
    }

    /// Mark the file's current attempt STARTED and return the snapshot to
    /// upload under it. `None` if the file is done, in flight, or deleted.
    fn claim(
        &self,
        snapshot: TransferFileSnapshot,
    ) -> Result<Option<TransferFileSnapshot>, TransferError> {
        let mut identity = self.tracker.latest_attempt(snapshot.identity());
        if self.tracker.state(&identity) == Some(TransferState::Failed) {
            identity = identity.retry();
        }
        if let Some(state) = self.tracker.state(&identity) {
            debug!("[{}] skipping {} in state {}", self.shard_id, identity, state);
            return Ok(None);
        }
        match self.tracker.on_started(&identity) {
            Ok(()) => Ok(Some(snapshot.with_identity(identity))),
            // Another uploader claimed it first
            Err(e) if e.is_illegal_transition() => {
                debug!("[{}] lost upload claim on {}: {}", self.shard_id, identity, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// End a claim whose upload never reported
    fn abandon(&self, identity: &FileIdentity, cause: &TransferError) {
        if let Err(e) = self.tracker.on_failure(identity, cause) {
            debug!("[{}] {} already reported: {}", self.shard_id, identity, e);
        }
    }

    fn log_summary(&self, summary: &UploadSummary) {
        if summary.failed > 0 {
            warn!(
                "[{}] translog upload to {}: {:?}",
                self.shard_id, self.remote_path, summary
            );
        } else if summary.uploaded > 0 {
            info!(
                "[{}] translog upload to {}: {:?}",
                self.shard_id, self.remote_path, summary
            );
        }
    }
}

/// Sum several upload passes
pub fn merge_summaries(summaries: impl IntoIterator<Item = UploadSummary>) -> UploadSummary {
    let mut total = UploadSummary::default();
    for summary in summaries {
        total.merge(summary);
    }
    total
}

fn snapshots_of(files: &GenerationFiles) -> [TransferFileSnapshot; 2] {
    let identity = |name: &str| {
        FileIdentity::new(name, files.info.primary_term, files.info.generation)
            .with_created_at(files.info.last_modified_ms)
    };
    [
        TransferFileSnapshot::new(identity(&files.data_file_name), files.data.clone()),
        TransferFileSnapshot::new(identity(&files.checkpoint_file_name), files.checkpoint.clone()),
    ]
}

fn parse_data_generation(name: &str) -> Option<u64> {
    name.strip_prefix("translog-")?
        .strip_suffix(".tlog")?
        .parse()
        .ok()
}
