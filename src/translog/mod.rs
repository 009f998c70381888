//! Translog - Shard Write-Ahead Log and Its Lifecycle
//!
//! Every acknowledged write to a shard is appended here before it is
//! acknowledged, and replayed from here after a crash.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ TranslogManager (roll/trim/recovery gate, engine hooks)  │
//! │   ├─ SyncActor (periodic sync under Async durability)    │
//! │   └─ Translog (generations, append, snapshot, sync)      │
//! │        ├─ DeletionPolicy (what may be trimmed)           │
//! │        ├─ RetentionLocks (held by open snapshots)        │
//! │        └─ GenerationStore (InMemory / Local / Simulated) │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod deletion_policy;
pub mod dst;
pub mod engine;
pub mod error;
pub mod file_store;
pub mod listener;
pub mod log;
pub mod manager;
pub mod operation;
pub mod seqno;
pub mod snapshot;
pub mod sync_actor;

pub use checkpoint::Checkpoint;
pub use clock::{ProductionClock, SimulatedClock, TranslogClock};
pub use config::{Durability, RetentionConfig, TranslogConfig};
pub use deletion_policy::{DefaultDeletionPolicy, DeletionPolicy};
pub use dst::{
    run_translog_dst_batch, summarize_translog_dst_batch, TranslogDSTConfig, TranslogDSTHarness,
    TranslogDSTResult,
};
pub use engine::{EngineFailure, EngineHooks, EngineLock, RecordingEngineHooks};
pub use error::TranslogError;
pub use file_store::{
    GenerationStore, GenerationWriter, InMemoryGenerationStore, LocalGenerationStore,
    SimulatedGenerationStore, SimulatedStoreConfig, StoreError,
};
pub use listener::{
    CompositeTranslogEventListener, CountingTranslogEventListener, NoopTranslogEventListener,
    TranslogEventCounts, TranslogEventListener,
};
pub use log::{GenerationFiles, GenerationInfo, Location, Translog, TranslogDeps, TranslogStats};
pub use manager::{TranslogManager, TranslogManagerArgs};
pub use operation::Operation;
pub use seqno::{LocalCheckpointTracker, SeqNo, SeqNoStats, NO_OPS_PERFORMED, UNASSIGNED_SEQ_NO};
pub use snapshot::{RetentionLease, Snapshot};
pub use sync_actor::{spawn_sync_actor, SyncActorHandle, SyncActorStats};
