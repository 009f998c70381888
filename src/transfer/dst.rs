//! Transfer Deterministic Simulation Testing Harness
//!
//! Two phases per seed:
//!
//! 1. **Transition fuzzing**: random `on_started` / `on_success` /
//!    `on_failure` / `on_deleted` calls against a shadow model of the
//!    transition table. Every call must succeed exactly when the shadow
//!    says it is legal, and a rejected call must leave the state alone.
//! 2. **Upload rounds**: a translog keeps rolling generations while a
//!    `TranslogUploader` ships them through a `SimulatedBlobStore` with
//!    injected faults, and remote copies are randomly deleted. After every
//!    pass:
//!    - each sealed file was reported exactly once per attempt
//!    - nothing is left STARTED
//!    - SUCCESS ⇔ the remote copy exists and matches byte for byte
//!    - FAILED / DELETED ⇒ no remote copy

use crate::io::{Rng, SimulatedRng};
use crate::transfer::blob_store::{
    BlobStore, InMemoryBlobStore, SimulatedBlobStore, SimulatedBlobStoreConfig,
    SimulatedBlobStoreStats,
};
use crate::transfer::error::TransferError;
use crate::transfer::file::FileIdentity;
use crate::transfer::service::{BlobStoreTransferService, RemotePath};
use crate::transfer::state::TransferState;
use crate::transfer::tracker::FileTransferTracker;
use crate::transfer::uploader::TranslogUploader;
use crate::translog::config::TranslogConfig;
use crate::translog::file_store::InMemoryGenerationStore;
use crate::translog::log::{Translog, TranslogDeps};
use crate::translog::operation::Operation;
use std::collections::BTreeMap;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;

type DstStore = SimulatedBlobStore<InMemoryBlobStore, SimulatedRng>;
type DstUploader = TranslogUploader<BlobStoreTransferService<DstStore>>;

/// Result of a single DST run
#[derive(Debug)]
pub struct TransferDSTResult {
    pub seed: u64,
    pub transitions_checked: usize,
    pub transitions_rejected: usize,
    pub upload_passes: usize,
    pub files_uploaded: u64,
    pub upload_failures: u64,
    pub files_deleted: usize,
    pub store_stats: SimulatedBlobStoreStats,
    pub passed: bool,
    pub error_message: Option<String>,
}

/// Configuration for the transfer DST harness
#[derive(Debug, Clone)]
pub struct TransferDSTConfig {
    /// Random tracker calls in phase 1
    pub transitions: usize,
    /// Distinct files phase 1 draws from
    pub files: usize,
    /// Upload rounds in phase 2
    pub rounds: usize,
    /// Operations appended per round
    pub ops_per_round: u64,
    pub store_config: SimulatedBlobStoreConfig,
    /// Chance per round of deleting the oldest uploaded generation
    pub delete_prob: f64,
}

impl Default for TransferDSTConfig {
    fn default() -> Self {
        TransferDSTConfig {
            transitions: 200,
            files: 6,
            rounds: 12,
            ops_per_round: 5,
            store_config: SimulatedBlobStoreConfig::default(),
            delete_prob: 0.2,
        }
    }
}

impl TransferDSTConfig {
    pub fn baseline() -> Self {
        TransferDSTConfig {
            store_config: SimulatedBlobStoreConfig::no_faults(),
            ..Default::default()
        }
    }

    pub fn chaos() -> Self {
        TransferDSTConfig {
            store_config: SimulatedBlobStoreConfig::high_chaos(),
            rounds: 20,
            ..Default::default()
        }
    }
}

/// Transfer DST harness
pub struct TransferDSTHarness {
    seed: u64,
    rng: SimulatedRng,
    config: TransferDSTConfig,
}

impl TransferDSTHarness {
    pub fn new(seed: u64, config: TransferDSTConfig) -> Self {
        TransferDSTHarness {
            seed,
            rng: SimulatedRng::new(seed),
            config,
        }
    }

    pub fn run(&mut self) -> TransferDSTResult {
        let mut result = TransferDSTResult {
            seed: self.seed,
            transitions_checked: 0,
            transitions_rejected: 0,
            upload_passes: 0,
            files_uploaded: 0,
            upload_failures: 0,
            files_deleted: 0,
            store_stats: SimulatedBlobStoreStats::default(),
            passed: false,
            error_message: None,
        };

        if let Err(msg) = self.fuzz_transitions(&mut result) {
            result.error_message = Some(msg);
            return result;
        }

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                result.error_message = Some(format!("failed to build runtime: {}", e));
                return result;
            }
        };
        let outcome = runtime.block_on(self.upload_rounds(&mut result));
        if let Err(msg) = outcome {
            result.error_message = Some(msg);
        }
        result.passed = result.error_message.is_none();
        result
    }

    // ------------------------------------------------------------------------
    // Phase 1
    // ------------------------------------------------------------------------

    fn fuzz_transitions(&mut self, result: &mut TransferDSTResult) -> Result<(), String> {
        let tracker = FileTransferTracker::new(format!("dst-{}", self.seed));
        let mut shadow: BTreeMap<FileIdentity, TransferState> = BTreeMap::new();
        let targets = [
            TransferState::Started,
            TransferState::Success,
            TransferState::Failed,
            TransferState::Deleted,
        ];
        let cause = TransferError::Io(IoError::new(ErrorKind::Other, "injected"));

        for step in 0..self.config.transitions {
            let index = self.rng.gen_range(0, self.config.files as u64);
            let file = FileIdentity::new(format!("translog-{}.tlog", index), 1, index);
            let target = targets[self.rng.gen_range(0, targets.len() as u64) as usize];

            let current = shadow.get(&file).copied();
            let legal = match current {
                None => true,
                Some(c) => c.can_transition_to(target),
            };
            let outcome = match target {
                TransferState::Started => tracker.on_started(&file),
                TransferState::Success => tracker.on_success(&file),
                TransferState::Failed => tracker.on_failure(&file, &cause),
                _ => tracker.on_deleted(&file),
            };
            result.transitions_checked += 1;

            match (legal, outcome) {
                (true, Ok(())) => {
                    shadow.insert(file.clone(), target);
                }
                (false, Err(e)) if e.is_illegal_transition() => {
                    result.transitions_rejected += 1;
                }
                (legal, outcome) => {
                    return Err(format!(
                        "seed {} step {}: {:?} -> {} expected legal={} got {:?}",
                        self.seed, step, current, target, legal, outcome
                    ));
                }
            }

            if tracker.state(&file) != shadow.get(&file).copied() {
                return Err(format!(
                    "seed {} step {}: tracker has {:?} for {}, shadow has {:?}",
                    self.seed,
                    step,
                    tracker.state(&file),
                    file,
                    shadow.get(&file)
                ));
            }
        }

        if tracker.len() != shadow.len() {
            return Err(format!(
                "seed {}: tracker holds {} files, shadow {}",
                self.seed,
                tracker.len(),
                shadow.len()
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Phase 2
    // ------------------------------------------------------------------------

    async fn upload_rounds(&mut self, result: &mut TransferDSTResult) -> Result<(), String> {
        let shard = format!("dst-{}", self.seed);
        let translog = Translog::open(
            &shard,
            &TranslogConfig::test(),
            &Translog::<InMemoryGenerationStore>::new_uuid(),
            InMemoryGenerationStore::new(),
            TranslogDeps::default(),
        )
        .map_err(|e| format!("seed {}: open failed: {}", self.seed, e))?;

        let store = SimulatedBlobStore::new(
            InMemoryBlobStore::new(),
            self.rng.fork(),
            self.config.store_config.clone(),
        );
        let uploader = TranslogUploader::new(
            shard.clone(),
            Arc::new(BlobStoreTransferService::new(store.clone())),
            Arc::new(FileTransferTracker::new(shard)),
            RemotePath::new(["indices", "dst", "0", "translog"]),
        );

        let mut seq_no = 0;
        let mut next_delete_generation = 1;
        for round in 0..self.config.rounds {
            for _ in 0..self.config.ops_per_round {
                let payload = format!("doc-{}-{}", seq_no, self.rng.next_u64()).into_bytes();
                translog
                    .add(&Operation::new(seq_no, 1, payload))
                    .map_err(|e| format!("seed {}: append failed: {}", self.seed, e))?;
                seq_no += 1;
            }
            translog
                .roll_generation()
                .map_err(|e| format!("seed {}: roll failed: {}", self.seed, e))?;

            let claimable = self.claimable_files(&translog, &uploader)?;
            let summary = if self.rng.gen_bool(0.5) {
                uploader.upload_sealed_generations(&translog).await
            } else {
                uploader.upload_sealed_generations_async(&translog).await
            }
            .map_err(|e| format!("seed {} round {}: upload pass failed: {}", self.seed, round, e))?;
            result.upload_passes += 1;
            result.files_uploaded += summary.uploaded;
            result.upload_failures += summary.failed;

            if summary.uploaded + summary.failed != claimable {
                return Err(format!(
                    "seed {} round {}: {} files claimable but {} reported",
                    self.seed,
                    round,
                    claimable,
                    summary.uploaded + summary.failed
                ));
            }

            if self.rng.gen_bool(self.config.delete_prob) {
                result.files_deleted += self
                    .delete_generation(&uploader, &store, next_delete_generation)
                    .await?;
                next_delete_generation += 1;
            }

            self.verify(&translog, &uploader, &store, round).await?;
        }

        result.store_stats = store.stats();
        Ok(())
    }

    /// Sealed files an upload pass will attempt
    fn claimable_files(
        &self,
        translog: &Translog<InMemoryGenerationStore>,
        uploader: &DstUploader,
    ) -> Result<u64, String> {
        let mut claimable = 0;
        for file in sealed_identities(translog)? {
            let latest = uploader.tracker().latest_attempt(&file);
            match uploader.tracker().state(&latest) {
                None | Some(TransferState::Failed) => claimable += 1,
                _ => {}
            }
        }
        Ok(claimable)
    }

    /// Delete the remote copies of one generation's successfully uploaded
    /// files, the way remote trimming would
    async fn delete_generation(
        &mut self,
        uploader: &DstUploader,
        store: &DstStore,
        generation: u64,
    ) -> Result<usize, String> {
        let mut deleted = 0;
        for file in uploader.tracker().files_in_state(TransferState::Success) {
            if file.generation != generation {
                continue;
            }
            let key = uploader.remote_path().key(&file.name);
            // Faulted deletes are retried against the store directly
            if store.delete(&key).await.is_err() {
                store
                    .inner_store()
                    .delete(&key)
                    .await
                    .map_err(|e| format!("seed {}: delete failed: {}", self.seed, e))?;
            }
            uploader
                .tracker()
                .on_deleted(&file)
                .map_err(|e| format!("seed {}: {}", self.seed, e))?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn verify(
        &self,
        translog: &Translog<InMemoryGenerationStore>,
        uploader: &DstUploader,
        store: &DstStore,
        round: usize,
    ) -> Result<(), String> {
        let remote = store.inner_store();
        for info in translog.sealed_generations() {
            let files = translog
                .generation_files(info.generation)
                .map_err(|e| format!("seed {}: {}", self.seed, e))?;
            let local = [
                (files.data_file_name.as_str(), &files.data),
                (files.checkpoint_file_name.as_str(), &files.checkpoint),
            ];
            for (name, bytes) in local {
                let file = uploader.tracker().latest_attempt(
                    &FileIdentity::new(name, info.primary_term, info.generation)
                        .with_created_at(info.last_modified_ms),
                );
                let state = uploader.tracker().state(&file);
                let remote_copy = remote.get(&uploader.remote_path().key(name)).await.ok();

                let consistent = match state {
                    Some(TransferState::Success) => remote_copy.as_ref() == Some(bytes),
                    Some(TransferState::Failed) | Some(TransferState::Deleted) => {
                        remote_copy.is_none()
                    }
                    // Never attempted, or left STARTED
                    _ => false,
                };
                if !consistent {
                    return Err(format!(
                        "seed {} round {}: {} is {:?} but remote copy {}",
                        self.seed,
                        round,
                        file,
                        state,
                        match &remote_copy {
                            Some(copy) if copy == bytes => "matches",
                            Some(_) => "differs",
                            None => "is missing",
                        }
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Identities of every sealed file, as the uploader derives them
fn sealed_identities(
    translog: &Translog<InMemoryGenerationStore>,
) -> Result<Vec<FileIdentity>, String> {
    let mut identities = Vec::new();
    for info in translog.sealed_generations() {
        let files = translog
            .generation_files(info.generation)
            .map_err(|e| e.to_string())?;
        for name in [files.data_file_name, files.checkpoint_file_name] {
            identities.push(
                FileIdentity::new(name, info.primary_term, info.generation)
                    .with_created_at(info.last_modified_ms),
            );
        }
    }
    Ok(identities)
}

/// Run a batch of DST tests across multiple seeds
pub fn run_transfer_dst_batch(
    seeds: std::ops::Range<u64>,
    config: TransferDSTConfig,
) -> Vec<TransferDSTResult> {
    seeds
        .map(|seed| TransferDSTHarness::new(seed, config.clone()).run())
        .collect()
}

/// Summarize batch results
pub fn summarize_transfer_dst_batch(results: &[TransferDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;

    let transitions: usize = results.iter().map(|r| r.transitions_checked).sum();
    let rejected: usize = results.iter().map(|r| r.transitions_rejected).sum();
    let uploaded: u64 = results.iter().map(|r| r.files_uploaded).sum();
    let upload_failures: u64 = results.iter().map(|r| r.upload_failures).sum();
    let deleted: usize = results.iter().map(|r| r.files_deleted).sum();

    let mut summary = format!(
        "Transfer DST Batch: {}/{} passed ({} failed)\n\
         Transitions: {} ({} rejected), Uploaded: {}, Upload failures: {}, Deleted: {}",
        passed, total, failed, transitions, rejected, uploaded, upload_failures, deleted
    );

    if failed > 0 {
        summary.push_str("\n\nFailed seeds:");
        for r in results.iter().filter(|r| !r.passed) {
            summary.push_str(&format!(
                "\n  Seed {}: {}",
                r.seed,
                r.error_message.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    summary
}
