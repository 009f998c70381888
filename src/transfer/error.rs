//! Transfer error types

use crate::transfer::state::TransferState;
use std::io::{Error as IoError, ErrorKind};

/// Errors surfaced by the transfer tracker and transfer service
#[derive(Debug)]
pub enum TransferError {
    /// The tracker saw an out-of-order state change for `file`
    IllegalStateTransition {
        file: String,
        current: TransferState,
        target: TransferState,
    },
    /// Uploading `file` failed
    Upload {
        file: String,
        source: Box<TransferError>,
    },
    /// I/O failure talking to the blob store
    Io(IoError),
    /// Remote blob does not exist
    NotFound(String),
}

impl TransferError {
    pub fn upload(file: impl Into<String>, source: TransferError) -> Self {
        TransferError::Upload {
            file: file.into(),
            source: Box::new(source),
        }
    }

    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, TransferError::IllegalStateTransition { .. })
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::IllegalStateTransition {
                file,
                current,
                target,
            } => write!(
                f,
                "unexpected transfer state {} while setting target to {} for {}",
                current, target, file
            ),
            TransferError::Upload { file, source } => {
                write!(f, "failed to upload {}: {}", file, source)
            }
            TransferError::Io(e) => write!(f, "transfer I/O error: {}", e),
            TransferError::NotFound(key) => write!(f, "remote file not found: {}", key),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Upload { source, .. } => Some(source.as_ref()),
            TransferError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for TransferError {
    fn from(e: IoError) -> Self {
        match e.kind() {
            ErrorKind::NotFound => TransferError::NotFound(e.to_string()),
            _ => TransferError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_transition_message() {
        let err = TransferError::IllegalStateTransition {
            file: "translog-3.tlog".into(),
            current: TransferState::Failed,
            target: TransferState::Success,
        };
        assert!(err.is_illegal_transition());
        assert_eq!(
            err.to_string(),
            "unexpected transfer state FAILED while setting target to SUCCESS for translog-3.tlog"
        );
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: TransferError = IoError::new(ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, TransferError::NotFound(_)));

        let err: TransferError = IoError::new(ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, TransferError::Io(_)));
    }
}
