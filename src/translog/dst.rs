//! Translog Deterministic Simulation Testing Harness
//!
//! Verifies the durability contract of the manager under fault injection:
//!
//! - **Acked writes survive**: every operation whose location was synced
//!   before the crash is replayed by the next recovery
//! - **No phantoms**: recovery only returns operations that were appended
//! - **Ordered, exactly once**: replay is strictly ascending by seq no
//!
//! ## DST Methodology
//!
//! Each run goes through several crash cycles over the same files:
//!
//! 1. Open a manager over a `SimulatedGenerationStore` and recover, with
//!    buggify suppressed so recovery itself sees a clean disk
//! 2. Append operations, acking those whose `ensure_translog_synced` succeeds;
//!    occasionally "flush" (advance the safe commit, roll, trim)
//! 3. Crash at a random point (unsynced tails are lost) and start over

use crate::io::{Rng, SimulatedRng};
use crate::translog::clock::SimulatedClock;
use crate::translog::config::TranslogConfig;
use crate::translog::engine::RecordingEngineHooks;
use crate::translog::error::TranslogError;
use crate::translog::file_store::{
    InMemoryGenerationStore, SimulatedGenerationStore, SimulatedStoreConfig, SimulatedStoreStats,
};
use crate::translog::log::Translog;
use crate::translog::manager::{TranslogManager, TranslogManagerArgs};
use crate::translog::operation::Operation;
use crate::translog::seqno::{SeqNo, NO_OPS_PERFORMED};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a single DST run
#[derive(Debug)]
pub struct TranslogDSTResult {
    pub seed: u64,
    pub total_ops: usize,
    pub acknowledged_ops: usize,
    pub failed_ops: usize,
    pub recovered_ops: usize,
    pub missing_after_recovery: usize,
    pub crashes: usize,
    pub flushes: usize,
    pub store_stats: SimulatedStoreStats,
    pub passed: bool,
    pub error_message: Option<String>,
}

/// Configuration for the translog DST harness
#[derive(Debug, Clone)]
pub struct TranslogDSTConfig {
    /// Operations attempted per crash cycle
    pub ops_per_cycle: usize,
    pub crash_cycles: usize,
    /// Small to force frequent rolls
    pub generation_threshold_size: u64,
    pub store_config: SimulatedStoreConfig,
    /// Chance of a flush after each operation
    pub flush_prob: f64,
    /// Sync after every append (request durability) or only occasionally
    pub sync_every_op: bool,
}

impl Default for TranslogDSTConfig {
    fn default() -> Self {
        TranslogDSTConfig {
            ops_per_cycle: 60,
            crash_cycles: 4,
            generation_threshold_size: 512,
            store_config: SimulatedStoreConfig::default(),
            flush_prob: 0.05,
            sync_every_op: true,
        }
    }
}

impl TranslogDSTConfig {
    /// No faults, baseline correctness
    pub fn baseline() -> Self {
        TranslogDSTConfig {
            store_config: SimulatedStoreConfig::no_faults(),
            ..Default::default()
        }
    }

    /// Crashes and batched syncs, no disk faults
    pub fn crash_only() -> Self {
        TranslogDSTConfig {
            store_config: SimulatedStoreConfig::no_faults(),
            sync_every_op: false,
            ..Default::default()
        }
    }

    /// Full chaos: faults + crashes
    pub fn chaos() -> Self {
        TranslogDSTConfig {
            store_config: SimulatedStoreConfig::high_chaos(),
            crash_cycles: 6,
            ..Default::default()
        }
    }
}

/// State that survives crashes: the committed documents and what was acked
#[derive(Default)]
struct Shadow {
    /// Seq no -> payload of every operation handed to the translog
    appended: BTreeMap<SeqNo, Vec<u8>>,
    /// Seq nos whose sync succeeded
    acked: Vec<SeqNo>,
    /// Appended in the current cycle but not yet synced; lost on crash
    pending: Vec<SeqNo>,
    /// Local checkpoint of the last flush
    committed: SeqNo,
}

/// Translog DST harness
pub struct TranslogDSTHarness {
    seed: u64,
    rng: SimulatedRng,
    config: TranslogDSTConfig,
}

impl TranslogDSTHarness {
    pub fn new(seed: u64, config: TranslogDSTConfig) -> Self {
        TranslogDSTHarness {
            seed,
            rng: SimulatedRng::new(seed),
            config,
        }
    }

    /// Run every crash cycle, verifying recovery at the start of each one and
    /// once more at the end
    pub fn run(&mut self) -> TranslogDSTResult {
        let files = InMemoryGenerationStore::new();
        let store = SimulatedGenerationStore::with_files(
            files.clone(),
            self.rng.fork(),
            self.config.store_config.clone(),
        );
        let translog_uuid = Translog::<InMemoryGenerationStore>::new_uuid();
        let clock = SimulatedClock::new(0);

        let mut shadow = Shadow {
            committed: NO_OPS_PERFORMED,
            ..Default::default()
        };
        let mut next_seq_no: SeqNo = 0;
        let mut failed_ops = 0;
        let mut flushes = 0;
        let mut crashes = 0;
        let mut recovered_ops = 0;
        let mut missing = 0;
        let mut error_message = None;

        for cycle in 0..=self.config.crash_cycles {
            let manager = {
                let _suppress = crate::suppress_buggify!();
                self.open_and_verify(&store, &translog_uuid, &clock, &shadow)
            };
            let manager = match manager {
                Ok((manager, recovered, missing_now)) => {
                    recovered_ops += recovered;
                    missing += missing_now;
                    if missing_now > 0 && error_message.is_none() {
                        error_message = Some(format!(
                            "INVARIANT VIOLATION: {} acknowledged ops missing after crash {}",
                            missing_now, crashes
                        ));
                    }
                    manager
                }
                Err(msg) => {
                    error_message.get_or_insert(msg);
                    break;
                }
            };

            // The final pass only verifies
            if cycle == self.config.crash_cycles {
                break;
            }

            let crash_at = self
                .rng
                .gen_range(1, (self.config.ops_per_cycle as u64).saturating_add(1))
                as usize;
            for _ in 0..crash_at {
                clock.advance_ms(self.rng.gen_range(1, 50));
                let seq_no = next_seq_no;
                next_seq_no += 1;

                match self.apply(&manager, &mut shadow, seq_no) {
                    Ok(()) => {}
                    Err(e) if e.is_already_closed() => {
                        failed_ops += 1;
                        break;
                    }
                    Err(_) => failed_ops += 1,
                }

                if self.rng.gen_bool(self.config.flush_prob) && self.flush(&manager, &mut shadow)
                {
                    flushes += 1;
                }
            }

            // Crash: no close, unsynced tails vanish
            drop(manager);
            files.simulate_crash();
            shadow.pending.clear();
            crashes += 1;
        }

        let passed = error_message.is_none();
        TranslogDSTResult {
            seed: self.seed,
            total_ops: next_seq_no as usize,
            acknowledged_ops: shadow.acked.len(),
            failed_ops,
            recovered_ops,
            missing_after_recovery: missing,
            crashes,
            flushes,
            store_stats: store.stats(),
            passed,
            error_message,
        }
    }

    /// Open a manager, replay everything above the committed checkpoint and
    /// check it against the shadow. Returns the manager, the number of ops
    /// replayed and the number of acked ops missing.
    fn open_and_verify(
        &self,
        store: &SimulatedGenerationStore<SimulatedRng>,
        translog_uuid: &str,
        clock: &SimulatedClock,
        shadow: &Shadow,
    ) -> Result<(TranslogManager<SimulatedGenerationStore<SimulatedRng>>, usize, usize), String>
    {
        let config = TranslogConfig {
            generation_threshold_size: self.config.generation_threshold_size,
            ..TranslogConfig::test()
        };
        let args = TranslogManagerArgs::new(
            format!("dst-{}", self.seed),
            config,
            translog_uuid,
            store.clone(),
            Arc::new(RecordingEngineHooks::new()),
        )
        .with_clock(Arc::new(clock.clone()));
        let manager = TranslogManager::open(args)
            .map_err(|e| format!("seed {}: reopen failed: {}", self.seed, e))?;
        manager
            .translog(false)
            .map_err(|e| e.to_string())?
            .deletion_policy()
            .set_local_checkpoint_of_safe_commit(shadow.committed);

        let mut replayed: Vec<Operation> = Vec::new();
        manager
            .recover_from_translog(
                |snapshot| {
                    replayed.extend(snapshot.by_ref());
                    Ok(replayed.len())
                },
                shadow.committed,
                SeqNo::MAX,
            )
            .map_err(|e| format!("seed {}: recovery failed: {}", self.seed, e))?;

        if !replayed.windows(2).all(|w| w[0].seq_no < w[1].seq_no) {
            return Err(format!(
                "seed {}: replay not strictly ascending by seq no",
                self.seed
            ));
        }
        for op in &replayed {
            match shadow.appended.get(&op.seq_no) {
                Some(payload) if *payload == op.payload => {}
                Some(_) => {
                    return Err(format!(
                        "seed {}: seq no {} replayed with the wrong payload",
                        self.seed, op.seq_no
                    ))
                }
                None => {
                    return Err(format!(
                        "seed {}: phantom seq no {} replayed",
                        self.seed, op.seq_no
                    ))
                }
            }
        }

        let missing = shadow
            .acked
            .iter()
            .filter(|&&seq| seq > shadow.committed)
            .filter(|&&seq| replayed.binary_search_by_key(&seq, |op| op.seq_no).is_err())
            .count();

        Ok((manager, replayed.len(), missing))
    }

    /// Append one operation and, per the durability mode, try to ack it
    fn apply(
        &mut self,
        manager: &TranslogManager<SimulatedGenerationStore<SimulatedRng>>,
        shadow: &mut Shadow,
        seq_no: SeqNo,
    ) -> Result<(), TranslogError> {
        let payload = format!("doc-{}-{}", seq_no, self.rng.next_u64()).into_bytes();
        shadow.appended.insert(seq_no, payload.clone());

        let location = manager
            .translog(true)?
            .add(&Operation::new(seq_no, 1, payload))?;
        shadow.pending.push(seq_no);

        if self.config.sync_every_op {
            manager.ensure_translog_synced(&[location])?;
        } else if self.rng.gen_bool(0.2) {
            manager.sync_translog()?;
        } else {
            return Ok(());
        }
        // A successful sync acks everything appended before it
        let synced = std::mem::take(&mut shadow.pending);
        shadow.acked.extend(synced);
        Ok(())
    }

    /// Commit everything acked so far, then roll and trim. Returns whether
    /// the commit point moved.
    fn flush(
        &mut self,
        manager: &TranslogManager<SimulatedGenerationStore<SimulatedRng>>,
        shadow: &mut Shadow,
    ) -> bool {
        if manager.ensure_can_flush().is_err() {
            return false;
        }
        let Some(&last_acked) = shadow.acked.last() else {
            return false;
        };
        if last_acked <= shadow.committed {
            return false;
        }

        shadow.committed = last_acked;
        if let Ok(translog) = manager.translog(false) {
            translog
                .deletion_policy()
                .set_local_checkpoint_of_safe_commit(last_acked);
        }
        // A failed roll closes the translog; the commit itself stands
        let _ = manager.roll_translog_generation();
        true
    }
}

/// Run a batch of DST tests across multiple seeds
pub fn run_translog_dst_batch(
    seeds: std::ops::Range<u64>,
    config: TranslogDSTConfig,
) -> Vec<TranslogDSTResult> {
    seeds
        .map(|seed| TranslogDSTHarness::new(seed, config.clone()).run())
        .collect()
}

/// Summarize batch results
pub fn summarize_translog_dst_batch(results: &[TranslogDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;

    let total_ops: usize = results.iter().map(|r| r.total_ops).sum();
    let total_acked: usize = results.iter().map(|r| r.acknowledged_ops).sum();
    let total_recovered: usize = results.iter().map(|r| r.recovered_ops).sum();
    let total_missing: usize = results.iter().map(|r| r.missing_after_recovery).sum();
    let total_crashes: usize = results.iter().map(|r| r.crashes).sum();

    let mut summary = format!(
        "Translog DST Batch: {}/{} passed ({} failed)\n\
         Total ops: {}, Acknowledged: {}, Recovered: {}, Missing: {}, Crashes: {}",
        passed, total, failed, total_ops, total_acked, total_recovered, total_missing, total_crashes
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
