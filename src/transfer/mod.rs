//! Transfer - Remote Upload of Translog Files
//!
//! Sealed translog generations are copied to a blob store so a shard can be
//! rebuilt elsewhere. Every attempt is reported to a per-shard tracker that
//! enforces the forward-only transfer state machine.
//!
//! ## Architecture
//!
//! ```text
//! Translog ──► TranslogUploader ──► TransferService ──► BlobStore
//!                    │                    │              (InMemory / LocalFs /
//!                    │  on_started        │ on_success    Simulated / S3)
//!                    ▼                    ▼ on_failure
//!              FileTransferTracker ◄──────┘
//! ```

pub mod blob_store;
pub mod config;
pub mod dst;
pub mod error;
pub mod file;
#[cfg(feature = "s3")]
pub mod s3_store;
pub mod service;
pub mod state;
pub mod tracker;
pub mod uploader;

pub use blob_store::{
    open_blob_store, BlobMeta, BlobStore, InMemoryBlobStore, LocalFsBlobStore, SimulatedBlobStore,
    SimulatedBlobStoreConfig, SimulatedBlobStoreStats,
};
#[cfg(feature = "s3")]
pub use config::S3Config;
pub use config::{BlobStoreType, TransferConfig};
pub use dst::{
    run_transfer_dst_batch, summarize_transfer_dst_batch, TransferDSTConfig, TransferDSTHarness,
    TransferDSTResult,
};
pub use error::TransferError;
pub use file::{FileIdentity, FileTransferListener, TransferFileSnapshot};
#[cfg(feature = "s3")]
pub use s3_store::S3BlobStore;
pub use service::{BlobStoreTransferService, RemotePath, TransferService};
pub use state::TransferState;
pub use tracker::FileTransferTracker;
pub use uploader::{merge_summaries, TranslogUploader, UploadSummary};
