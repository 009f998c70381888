//! Hot path benchmarks for profiling-driven optimization.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! Covers the per-write costs of a shard: translog append and sync,
//! operation encoding, snapshot reads, and transfer state transitions.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use shard_translog::transfer::{FileIdentity, FileTransferTracker};
use shard_translog::translog::{
    InMemoryGenerationStore, Operation, Translog, TranslogConfig, TranslogDeps,
};

fn open_translog(config: &TranslogConfig) -> Translog<InMemoryGenerationStore> {
    Translog::open(
        "[bench][0]",
        config,
        &Translog::<InMemoryGenerationStore>::new_uuid(),
        InMemoryGenerationStore::new(),
        TranslogDeps::default(),
    )
    .expect("open in-memory translog")
}

fn bench_config() -> TranslogConfig {
    let mut config = TranslogConfig::test();
    config.generation_threshold_size = u64::MAX;
    config
}

/// Benchmark Translog::add - every indexing operation goes through it
fn bench_translog_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("translog_add");
    group.throughput(Throughput::Elements(1));

    for payload_len in [64, 512, 4096] {
        let payload = vec![b'x'; payload_len];

        group.bench_function(format!("payload_{}", payload_len), |b| {
            let translog = open_translog(&bench_config());
            let mut seq_no = 0;
            b.iter(|| {
                seq_no += 1;
                translog
                    .add(black_box(&Operation::new(seq_no, 1, payload.clone())))
                    .expect("add")
            })
        });
    }

    group.finish();
}

/// Benchmark add followed by sync (request durability)
fn bench_translog_add_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("translog_add_sync");
    group.throughput(Throughput::Elements(1));

    group.bench_function("payload_256", |b| {
        let translog = open_translog(&bench_config());
        let payload = vec![b'x'; 256];
        let mut seq_no = 0;
        b.iter(|| {
            seq_no += 1;
            let location = translog
                .add(&Operation::new(seq_no, 1, payload.clone()))
                .expect("add");
            translog.ensure_synced(black_box(&[location])).expect("sync")
        })
    });

    group.finish();
}

/// Benchmark record encoding
fn bench_operation_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_encode");
    group.throughput(Throughput::Elements(1));

    for payload_len in [64, 1024] {
        let op = Operation::new(42, 3, vec![b'x'; payload_len]);
        group.bench_function(format!("payload_{}", payload_len), |b| {
            b.iter(|| black_box(&op).encode().expect("encode"))
        });
    }

    group.finish();
}

/// Benchmark reading a range back across several generations
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    let translog = open_translog(&bench_config());
    for seq_no in 0..1_000 {
        translog
            .add(&Operation::new(seq_no, 1, vec![b'x'; 128]))
            .expect("add");
        if seq_no % 250 == 249 {
            translog.roll_generation().expect("roll");
        }
    }
    translog.sync().expect("sync");

    group.throughput(Throughput::Elements(1_000));
    group.bench_function("full_range_1000", |b| {
        b.iter(|| {
            translog
                .new_snapshot(black_box(0), black_box(999))
                .expect("snapshot")
                .count()
        })
    });

    group.throughput(Throughput::Elements(100));
    group.bench_function("tail_100", |b| {
        b.iter(|| translog.new_snapshot(900, 999).expect("snapshot").count())
    });

    group.finish();
}

/// Benchmark the tracker's per-key transitions
fn bench_tracker_transitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_transitions");
    group.throughput(Throughput::Elements(1));

    group.bench_function("started_success_deleted", |b| {
        let tracker = FileTransferTracker::new("[bench][0]");
        let mut generation = 0;
        b.iter(|| {
            generation += 1;
            let file = FileIdentity::new("translog.tlog", 1, generation);
            tracker.on_started(&file).expect("started");
            tracker.on_success(&file).expect("success");
            tracker.on_deleted(black_box(&file)).expect("deleted")
        })
    });

    group.bench_function("rejected_transition", |b| {
        b.iter_batched(
            || {
                let tracker = FileTransferTracker::new("[bench][0]");
                let file = FileIdentity::new("translog-1.tlog", 1, 1);
                tracker.on_deleted(&file).expect("deleted");
                (tracker, file)
            },
            |(tracker, file)| tracker.on_success(black_box(&file)).is_err(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_translog_add,
    bench_translog_add_sync,
    bench_operation_encode,
    bench_snapshot,
    bench_tracker_transitions,
);

criterion_main!(benches);
