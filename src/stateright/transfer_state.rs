//! Stateright Model for the File Transfer Tracker
//!
//! Reporters (uploader, async completions, deletion) race to report
//! outcomes for a handful of files. Every report goes through
//! `TransferState::can_transition_to`, with an absent entry validated as
//! INIT, exactly like `FileTransferTracker`. Verifies:
//! - FORWARD_ONLY: an accepted report never lowers a file's state
//! - DELETED_ABSORBING: once deleted, a file stays deleted
//! - SINGLE_DELETE_ACK: at most one delete is acknowledged per file
//! - SUCCESS_STICKY: a successful upload can only be followed by deletion
//! - FAILED_STICKY: a failed attempt never becomes anything but deleted;
//!   the uploader retries under a new identity instead

use crate::transfer::TransferState;
use stateright::{Model, Property};

fn rank(state: Option<TransferState>) -> u8 {
    match state {
        None | Some(TransferState::Init) => 0,
        Some(TransferState::Started) => 1,
        Some(TransferState::Success) | Some(TransferState::Failed) => 2,
        Some(TransferState::Deleted) => 3,
    }
}

/// Tracker entry for one file plus history the properties need
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileRecord {
    pub state: Option<TransferState>,
    pub deletes_acked: u8,
    pub ever_deleted: bool,
    pub ever_succeeded: bool,
    pub ever_failed: bool,
    /// Set if an accepted report moved the state backwards
    pub regressed: bool,
}

impl FileRecord {
    fn new() -> Self {
        FileRecord {
            state: None,
            deletes_acked: 0,
            ever_deleted: false,
            ever_succeeded: false,
            ever_failed: false,
            regressed: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackerModelState {
    pub files: Vec<FileRecord>,
    pub steps: u8,
    pub rejected: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrackerAction {
    /// `on_started` / `on_success` / `on_failure` / `on_deleted`
    Report { file: usize, target: TransferState },
}

pub struct TransferStateModel {
    pub files: usize,
    pub max_steps: u8,
}

impl TransferStateModel {
    pub fn new(files: usize, max_steps: u8) -> Self {
        TransferStateModel { files, max_steps }
    }
}

impl Default for TransferStateModel {
    fn default() -> Self {
        Self::new(2, 6)
    }
}

impl Model for TransferStateModel {
    type State = TrackerModelState;
    type Action = TrackerAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![TrackerModelState {
            files: vec![FileRecord::new(); self.files],
            steps: 0,
            rejected: 0,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        if state.steps >= self.max_steps {
            return;
        }
        for file in 0..state.files.len() {
            for target in [
                TransferState::Started,
                TransferState::Success,
                TransferState::Failed,
                TransferState::Deleted,
            ] {
                actions.push(TrackerAction::Report { file, target });
            }
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        next.steps += 1;

        match action {
            TrackerAction::Report { file, target } => {
                let record = next.files.get_mut(file)?;
                let current = record.state.unwrap_or(TransferState::Init);
                if !current.can_transition_to(target) {
                    next.rejected = next.rejected.saturating_add(1);
                    return Some(next);
                }
                if rank(Some(target)) < rank(record.state) {
                    record.regressed = true;
                }
                record.state = Some(target);
                match target {
                    TransferState::Deleted => {
                        record.deletes_acked += 1;
                        record.ever_deleted = true;
                    }
                    TransferState::Success => record.ever_succeeded = true,
                    TransferState::Failed => record.ever_failed = true,
                    _ => {}
                }
            }
        }

        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("forward_only", |_: &TransferStateModel, state: &TrackerModelState| {
                state.files.iter().all(|f| !f.regressed)
            }),
            Property::always("deleted_absorbing", |_: &TransferStateModel, state: &TrackerModelState| {
                state
                    .files
                    .iter()
                    .all(|f| !f.ever_deleted || f.state == Some(TransferState::Deleted))
            }),
            Property::always("single_delete_ack", |_: &TransferStateModel, state: &TrackerModelState| {
                state.files.iter().all(|f| f.deletes_acked <= 1)
            }),
            Property::always("success_sticky", |_: &TransferStateModel, state: &TrackerModelState| {
                state.files.iter().all(|f| {
                    !f.ever_succeeded
                        || matches!(
                            f.state,
                            Some(TransferState::Success) | Some(TransferState::Deleted)
                        )
                })
            }),
            Property::always("failed_sticky", |_: &TransferStateModel, state: &TrackerModelState| {
                state.files.iter().all(|f| {
                    !f.ever_failed
                        || matches!(
                            f.state,
                            Some(TransferState::Failed) | Some(TransferState::Deleted)
                        )
                })
            }),
            Property::sometimes("uploaded_then_deleted", |_: &TransferStateModel, state: &TrackerModelState| {
                state
                    .files
                    .iter()
                    .any(|f| f.ever_succeeded && f.state == Some(TransferState::Deleted))
            }),
            Property::sometimes("failure_rejected_then_other_succeeded", |_: &TransferStateModel, state: &TrackerModelState| {
                state.rejected > 0
                    && state.files.iter().any(|f| f.state == Some(TransferState::Failed))
                    && state.files.iter().any(|f| f.ever_succeeded)
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    fn report(file: usize, target: TransferState) -> TrackerAction {
        TrackerAction::Report { file, target }
    }

    #[test]
    fn test_second_delete_rejected() {
        let model = TransferStateModel::new(1, 10);
        let init = model.init_states().remove(0);
        let s1 = model.next_state(&init, report(0, TransferState::Deleted)).unwrap();
        let s2 = model.next_state(&s1, report(0, TransferState::Deleted)).unwrap();
        assert_eq!(s2.files[0].deletes_acked, 1);
        assert_eq!(s2.rejected, 1);
    }

    #[test]
    fn test_failed_attempt_never_restarts() {
        let model = TransferStateModel::new(1, 10);
        let init = model.init_states().remove(0);
        let failed = model.next_state(&init, report(0, TransferState::Failed)).unwrap();

        for target in [TransferState::Started, TransferState::Success, TransferState::Failed] {
            let rejected = model.next_state(&failed, report(0, target)).unwrap();
            assert_eq!(rejected.files[0].state, Some(TransferState::Failed));
            assert_eq!(rejected.rejected, 1);
        }
        let deleted = model.next_state(&failed, report(0, TransferState::Deleted)).unwrap();
        assert_eq!(deleted.files[0].state, Some(TransferState::Deleted));
    }

    #[test]
    fn test_small_model_check() {
        let checker = TransferStateModel::new(2, 4).checker().spawn_bfs().join();
        checker.assert_properties();
    }

    #[test]
    #[ignore] // Run with: cargo test stateright_transfer_state -- --ignored --nocapture
    fn stateright_transfer_state_model_check() {
        let checker = TransferStateModel::new(2, 7).checker().spawn_bfs().join();

        println!("States explored: {}", checker.unique_state_count());

        checker.assert_properties();

        println!("Model check passed! All transfer state invariants hold.");
    }
}
