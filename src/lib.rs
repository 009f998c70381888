//! shard-translog
//!
//! Durability layer of a search-engine shard:
//!
//! - `translog`: the per-shard write-ahead log and its lifecycle manager
//! - `transfer`: remote upload of sealed translog files and per-file state tracking
//!
//! Fault injection (`buggify`) and seeded randomness (`io`) back the
//! deterministic simulation harnesses in both.

pub mod buggify;
pub mod config;
pub mod io;
pub mod observability;
pub mod transfer;
pub mod translog;

#[cfg(test)]
mod stateright;

pub use config::{ConfigError, ShardDurabilityConfig};
pub use transfer::{
    FileIdentity, FileTransferListener, FileTransferTracker, TransferError, TransferService,
    TransferState,
};
pub use translog::{
    Operation, Translog, TranslogConfig, TranslogError, TranslogManager, TranslogManagerArgs,
};
