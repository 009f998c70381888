//! Transfer state machine
//!
//! ```text
//!          ┌──────────► SUCCESS ──┐
//!  INIT ──► STARTED ─┤            ├──► DELETED
//!          └──────────► FAILED ───┘
//! ```
//!
//! INIT may also jump straight to any later state. Transitions only move
//! forward and DELETED is terminal.

use serde::{Deserialize, Serialize};

/// Remote transfer state of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Init,
    Started,
    Success,
    Failed,
    Deleted,
}

impl TransferState {
    pub const ALL: [TransferState; 5] = [
        TransferState::Init,
        TransferState::Started,
        TransferState::Success,
        TransferState::Failed,
        TransferState::Deleted,
    ];

    /// Targets reachable in one step
    pub fn allowed_targets(self) -> &'static [TransferState] {
        use TransferState::*;
        match self {
            Init => &[Started, Success, Failed, Deleted],
            Started => &[Success, Failed, Deleted],
            Success | Failed => &[Deleted],
            Deleted => &[],
        }
    }

    pub fn can_transition_to(self, target: TransferState) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// True once no further transition is possible
    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferState::Init => "INIT",
            TransferState::Started => "STARTED",
            TransferState::Success => "SUCCESS",
            TransferState::Failed => "FAILED",
            TransferState::Deleted => "DELETED",
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
