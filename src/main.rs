use shard_translog::io::{ProductionRng, Rng};
use shard_translog::observability::{init_tracing, LoggingConfig};
use shard_translog::transfer::{
    run_transfer_dst_batch, summarize_transfer_dst_batch, FileIdentity, FileTransferTracker,
    TransferDSTConfig, TransferError, TransferState,
};
use shard_translog::translog::{
    run_translog_dst_batch, summarize_translog_dst_batch, InMemoryGenerationStore, Operation,
    RecordingEngineHooks, Translog, TranslogConfig, TranslogDSTConfig, TranslogManager,
    TranslogManagerArgs,
};
use std::error::Error;
use std::sync::{Arc, Barrier};
use std::thread;

type SimResult = Result<(), Box<dyn Error + Send + Sync>>;

fn main() -> SimResult {
    init_tracing(&LoggingConfig::from_env())?;

    println!("=== Shard Translog Simulator ===\n");

    println!("Running scenarios...\n");

    scenario_recovery_enables_flush()?;
    scenario_failed_then_success_rejected()?;
    scenario_concurrent_delete()?;
    scenario_snapshot_across_generations()?;

    // SIM_SEED replays a previous run; otherwise explore from a fresh seed
    let base_seed = match std::env::var("SIM_SEED") {
        Ok(seed) => seed.parse::<u64>()?,
        Err(_) => ProductionRng::new().next_u64() >> 16,
    };
    println!("Running DST batches from seed {}...\n", base_seed);
    let seeds = base_seed..base_seed + 25;

    let translog_results = run_translog_dst_batch(seeds.clone(), TranslogDSTConfig::chaos());
    println!("{}\n", summarize_translog_dst_batch(&translog_results));

    let transfer_results = run_transfer_dst_batch(seeds, TransferDSTConfig::chaos());
    println!("{}\n", summarize_transfer_dst_batch(&transfer_results));

    let failed = translog_results.iter().filter(|r| !r.passed).count()
        + transfer_results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        return Err(format!("{} DST seeds failed", failed).into());
    }

    println!("=== All scenarios completed successfully! ===");
    Ok(())
}

fn open_manager(
    shard_id: &str,
    config: TranslogConfig,
) -> Result<TranslogManager<InMemoryGenerationStore>, Box<dyn Error + Send + Sync>> {
    let args = TranslogManagerArgs::new(
        shard_id,
        config,
        Translog::<InMemoryGenerationStore>::new_uuid(),
        InMemoryGenerationStore::new(),
        Arc::new(RecordingEngineHooks::new()),
    );
    Ok(TranslogManager::open(args)?)
}

fn scenario_recovery_enables_flush() -> SimResult {
    println!("--- Scenario 1: Recovery Gates Flushes ---");

    let manager = open_manager("[sim][0]", TranslogConfig::test())?;
    if manager.ensure_can_flush().is_ok() {
        return Err("flush allowed before recovery".into());
    }

    let recovered = manager.recover_from_translog(|_| Ok(0), 0, 0)?;
    manager.ensure_can_flush()?;

    println!("  ✓ Flush refused while pending, allowed after recovering {} ops\n", recovered);
    Ok(())
}

fn scenario_failed_then_success_rejected() -> SimResult {
    println!("--- Scenario 2: FAILED Cannot Become SUCCESS ---");

    let tracker = FileTransferTracker::new("[sim][0]");
    let file = FileIdentity::new("translog-1.tlog", 1, 1);
    let cause = TransferError::NotFound("translog-1.tlog".to_string());

    tracker.on_failure(&file, &cause)?;
    match tracker.on_success(&file) {
        Err(e) if e.is_illegal_transition() => {}
        other => return Err(format!("expected illegal transition, got {:?}", other).into()),
    }
    if tracker.state(&file) != Some(TransferState::Failed) {
        return Err("state changed after rejected transition".into());
    }

    println!("  ✓ {} stays {}\n", file, TransferState::Failed);
    Ok(())
}

fn scenario_concurrent_delete() -> SimResult {
    println!("--- Scenario 3: Concurrent Delete Counted Once ---");

    let tracker = Arc::new(FileTransferTracker::new("[sim][0]"));
    let file = FileIdentity::new("translog-2.tlog", 1, 2);
    tracker.on_success(&file)?;

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let tracker = tracker.clone();
            let barrier = barrier.clone();
            let file = file.clone();
            thread::spawn(move || {
                barrier.wait();
                tracker.on_deleted(&file).is_ok()
            })
        })
        .collect();

    let mut acknowledged = 0;
    for handle in handles {
        if handle.join().map_err(|_| "delete thread panicked")? {
            acknowledged += 1;
        }
    }
    if acknowledged != 1 || tracker.state(&file) != Some(TransferState::Deleted) {
        return Err(format!("{} deletes acknowledged", acknowledged).into());
    }

    println!("  ✓ Exactly one of two racing deletes acknowledged\n");
    Ok(())
}

fn scenario_snapshot_across_generations() -> SimResult {
    println!("--- Scenario 4: Snapshot Across Generations ---");

    let mut config = TranslogConfig::test();
    config.generation_threshold_size = u64::MAX;
    let manager = open_manager("[sim][0]", config)?;
    manager.skip_translog_recovery();

    let translog = manager.translog(true)?;
    for seq_no in 1..=100 {
        translog.add(&Operation::new(seq_no, 1, format!("doc-{}", seq_no)))?;
        if seq_no == 50 {
            translog.roll_generation()?;
        }
    }
    translog.roll_generation()?;

    let seq_nos: Vec<_> = translog.new_snapshot(1, 100)?.map(|op| op.seq_no).collect();
    if seq_nos != (1..=100).collect::<Vec<_>>() {
        return Err(format!("snapshot yielded {} out-of-order or missing ops", seq_nos.len()).into());
    }

    println!(
        "  ✓ 100 ops read back in order from generation {}\n",
        translog.current_generation()
    );
    Ok(())
}
