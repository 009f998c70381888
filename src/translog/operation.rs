//! Translog Operation Records and Generation Header
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ Header (40 bytes)                │
//! │ - magic: "TLOG" (4 bytes)        │
//! │ - version: u8                    │
//! │ - reserved: 3 bytes              │
//! │ - generation: u64 LE             │
//! │ - primary_term: u64 LE           │
//! │ - translog_uuid: 16 bytes        │
//! ├──────────────────────────────────┤
//! │ Record 0                         │
//! │ - data_length: u32 LE            │
//! │ - checksum: u32 LE (CRC32)       │
//! │ - data: bincode(Operation)       │
//! ├──────────────────────────────────┤
//! │ Record 1 ...                     │
//! └──────────────────────────────────┘
//! ```
//!
//! Each record is individually CRC32-checksummed. Decoding stops at the first
//! truncated or corrupted record; the caller compares what was decoded with
//! the generation checkpoint to tell a torn tail from corruption.

use crate::translog::error::TranslogError;
use crate::translog::seqno::SeqNo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generation file magic number
pub const TRANSLOG_MAGIC: [u8; 4] = *b"TLOG";
/// Current generation file format version
pub const TRANSLOG_VERSION: u8 = 1;
/// Header size in bytes
pub const TRANSLOG_HEADER_SIZE: usize = 40;
/// Record overhead: data_length(4) + checksum(4)
pub const RECORD_OVERHEAD: usize = 8;

/// A single indexing operation as stored in the translog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub seq_no: SeqNo,
    pub primary_term: u64,
    pub payload: Vec<u8>,
}

impl Operation {
    pub fn new(seq_no: SeqNo, primary_term: u64, payload: impl Into<Vec<u8>>) -> Self {
        Operation {
            seq_no,
            primary_term,
            payload: payload.into(),
        }
    }

    /// Encode as a checksummed record
    pub fn encode(&self) -> Result<Vec<u8>, TranslogError> {
        let data = bincode::serialize(self)
            .map_err(|e| TranslogError::Corrupted(format!("serialize: {}", e)))?;
        debug_assert!(!data.is_empty(), "Postcondition: serialized data must not be empty");

        let data_len = u32::try_from(data.len()).map_err(|_| {
            TranslogError::Corrupted(format!("operation too large: {} bytes", data.len()))
        })?;
        let checksum = crc32fast::hash(&data);
        let total_size = RECORD_OVERHEAD
            .checked_add(data.len())
            .expect("record size overflow is unreachable for data < u32::MAX");

        let mut buf = Vec::with_capacity(total_size);
        buf.extend_from_slice(&data_len.to_le_bytes());
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf.extend_from_slice(&data);

        debug_assert_eq!(
            buf.len(),
            total_size,
            "Postcondition: encoded size must match expected"
        );
        Ok(buf)
    }

    /// Decode one record from the front of `data`. Returns None if the record
    /// is truncated, fails its checksum, or does not deserialize.
    pub fn decode(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < RECORD_OVERHEAD {
            return None;
        }

        let data_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let checksum = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        let total_size = RECORD_OVERHEAD.checked_add(data_len)?;
        if data.len() < total_size {
            return None; // Truncated record
        }

        let body = &data[RECORD_OVERHEAD..total_size];
        if crc32fast::hash(body) != checksum {
            return None;
        }

        let op: Operation = bincode::deserialize(body).ok()?;
        Some((op, total_size))
    }
}

/// Decode records from `data[TRANSLOG_HEADER_SIZE..limit]`
pub fn decode_operations(data: &[u8], limit: usize) -> Vec<Operation> {
    let end = limit.min(data.len());
    let mut ops = Vec::new();
    let mut offset = TRANSLOG_HEADER_SIZE;

    while offset < end {
        match Operation::decode(&data[offset..end]) {
            Some((op, consumed)) => {
                ops.push(op);
                offset = offset
                    .checked_add(consumed)
                    .expect("offset overflow is unreachable");
            }
            None => break,
        }
    }

    ops
}

/// Header written at the start of every generation file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationHeader {
    pub generation: u64,
    pub primary_term: u64,
    pub translog_uuid: Uuid,
}

impl GenerationHeader {
    pub fn encode(&self) -> [u8; TRANSLOG_HEADER_SIZE] {
        let mut header = [0u8; TRANSLOG_HEADER_SIZE];
        header[0..4].copy_from_slice(&TRANSLOG_MAGIC);
        header[4] = TRANSLOG_VERSION;
        // header[5..8] reserved
        header[8..16].copy_from_slice(&self.generation.to_le_bytes());
        header[16..24].copy_from_slice(&self.primary_term.to_le_bytes());
        header[24..40].copy_from_slice(self.translog_uuid.as_bytes());
        header
    }

    /// Parse and validate a header
    pub fn decode(data: &[u8]) -> Result<Self, TranslogError> {
        if data.len() < TRANSLOG_HEADER_SIZE {
            return Err(TranslogError::Corrupted(
                "generation file too short for header".to_string(),
            ));
        }
        if data[0..4] != TRANSLOG_MAGIC {
            return Err(TranslogError::Corrupted(format!(
                "invalid translog magic: {:?}",
                &data[0..4]
            )));
        }
        if data[4] != TRANSLOG_VERSION {
            return Err(TranslogError::Corrupted(format!(
                "unsupported translog version: {}",
                data[4]
            )));
        }

        let mut generation = [0u8; 8];
        generation.copy_from_slice(&data[8..16]);
        let mut primary_term = [0u8; 8];
        primary_term.copy_from_slice(&data[16..24]);
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&data[24..40]);

        Ok(GenerationHeader {
            generation: u64::from_le_bytes(generation),
            primary_term: u64::from_le_bytes(primary_term),
            translog_uuid: Uuid::from_bytes(uuid),
        })
    }
}
