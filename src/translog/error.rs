//! Translog error types

use crate::translog::file_store::StoreError;
use std::io::{Error as IoError, ErrorKind};

/// Errors surfaced by the translog and its lifecycle manager
#[derive(Debug)]
pub enum TranslogError {
    /// The translog could not be opened for a shard
    Initialization {
        shard_id: String,
        source: Box<TranslogError>,
    },
    /// Recovery invoked twice, or flush attempted while recovery is pending
    IllegalLifecycleState(String),
    /// Roll/trim/recovery failure wrapping the underlying cause.
    /// `suppressed` carries secondary failures hit while reacting to `source`.
    Operation {
        shard_id: String,
        message: String,
        source: Box<TranslogError>,
        suppressed: Vec<TranslogError>,
    },
    /// The translog is closed, possibly because of an earlier tragic event
    AlreadyClosed {
        reason: String,
        tragic: Option<String>,
    },
    /// I/O failure from the generation store
    Io(IoError),
    /// Checksum, header, or checkpoint mismatch
    Corrupted(String),
    /// Raised by a caller-supplied replay function
    Replay(String),
    /// Raised by an engine hook
    Engine(String),
}

impl TranslogError {
    /// Shorthand for a wrapped operation failure with no suppressed causes yet
    pub fn operation(shard_id: &str, message: impl Into<String>, source: TranslogError) -> Self {
        TranslogError::Operation {
            shard_id: shard_id.to_string(),
            message: message.into(),
            source: Box::new(source),
            suppressed: Vec::new(),
        }
    }

    /// Attach a secondary failure. Non-`Operation` errors are wrapped first so
    /// the primary cause stays on top.
    pub fn with_suppressed(self, secondary: TranslogError) -> Self {
        match self {
            TranslogError::Operation {
                shard_id,
                message,
                source,
                mut suppressed,
            } => {
                suppressed.push(secondary);
                TranslogError::Operation {
                    shard_id,
                    message,
                    source,
                    suppressed,
                }
            }
            other => {
                let message = other.to_string();
                TranslogError::Operation {
                    shard_id: String::new(),
                    message,
                    source: Box::new(other),
                    suppressed: vec![secondary],
                }
            }
        }
    }

    /// Secondary failures attached to this error
    pub fn suppressed(&self) -> &[TranslogError] {
        match self {
            TranslogError::Operation { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    /// The wrapped cause, if any
    pub fn cause(&self) -> Option<&TranslogError> {
        match self {
            TranslogError::Initialization { source, .. } => Some(source),
            TranslogError::Operation { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_already_closed(&self) -> bool {
        matches!(self, TranslogError::AlreadyClosed { .. })
    }

    /// True when this error, or any error it wraps, is a corruption
    pub fn is_corruption(&self) -> bool {
        match self {
            TranslogError::Corrupted(_) => true,
            other => other.cause().map(|c| c.is_corruption()).unwrap_or(false),
        }
    }
}

impl std::fmt::Display for TranslogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslogError::Initialization { shard_id, source } => {
                write!(f, "[{}] failed to initialize translog: {}", shard_id, source)
            }
            TranslogError::IllegalLifecycleState(msg) => write!(f, "{}", msg),
            TranslogError::Operation {
                shard_id,
                message,
                source,
                suppressed,
            } => {
                if shard_id.is_empty() {
                    write!(f, "{}: {}", message, source)?;
                } else {
                    write!(f, "[{}] {}: {}", shard_id, message, source)?;
                }
                if !suppressed.is_empty() {
                    write!(f, " ({} suppressed)", suppressed.len())?;
                }
                Ok(())
            }
            TranslogError::AlreadyClosed { reason, tragic } => match tragic {
                Some(cause) => {
                    write!(f, "translog already closed: {} (tragic: {})", reason, cause)
                }
                None => write!(f, "translog already closed: {}", reason),
            },
            TranslogError::Io(e) => write!(f, "translog I/O error: {}", e),
            TranslogError::Corrupted(msg) => write!(f, "translog corrupted: {}", msg),
            TranslogError::Replay(msg) => write!(f, "translog replay failed: {}", msg),
            TranslogError::Engine(msg) => write!(f, "engine failure: {}", msg),
        }
    }
}

impl std::error::Error for TranslogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranslogError::Initialization { source, .. } => Some(source.as_ref()),
            TranslogError::Operation { source, .. } => Some(source.as_ref()),
            TranslogError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for TranslogError {
    fn from(e: IoError) -> Self {
        TranslogError::Io(e)
    }
}

impl From<StoreError> for TranslogError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(e) => TranslogError::Io(e),
            StoreError::Corruption(msg) => TranslogError::Corrupted(msg),
            other => TranslogError::Io(IoError::new(ErrorKind::Other, other.to_string())),
        }
    }
}
