//! Generation checkpoints
//!
//! Each generation has a JSON sidecar `translog-{gen}.ckp`. It is rewritten
//! whenever the generation is synced or sealed, and it marks the durable
//! prefix of the data file: on reopen only `offset` bytes and `num_ops`
//! operations count.

use crate::translog::error::TranslogError;
use crate::translog::seqno::SeqNo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub generation: u64,
    pub num_ops: u64,
    /// Durable length of the data file, header included
    pub offset: u64,
    pub min_seq_no: SeqNo,
    pub max_seq_no: SeqNo,
    pub global_checkpoint: SeqNo,
    pub trimmed_above_seq_no: SeqNo,
    pub primary_term: u64,
    pub translog_uuid: String,
    pub last_modified_ms: u64,
}

impl Checkpoint {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TranslogError> {
        serde_json::to_vec(self)
            .map_err(|e| TranslogError::Corrupted(format!("checkpoint serialize: {}", e)))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, TranslogError> {
        serde_json::from_slice(data)
            .map_err(|e| TranslogError::Corrupted(format!("checkpoint deserialize: {}", e)))
    }
}

/// Data file name for a generation
pub fn generation_file_name(generation: u64) -> String {
    format!("translog-{}.tlog", generation)
}

/// Checkpoint file name for a generation
pub fn checkpoint_file_name(generation: u64) -> String {
    format!("translog-{}.ckp", generation)
}

/// Parse the generation out of a checkpoint file name
pub fn parse_checkpoint_generation(name: &str) -> Option<u64> {
    name.strip_prefix("translog-")?
        .strip_suffix(".ckp")?
        .parse()
        .ok()
}
