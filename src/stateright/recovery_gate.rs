//! Stateright Model for the Pending-Recovery Gate
//!
//! Models `TranslogManager`'s recovery flag against a flusher that may try
//! to flush at any point. A recovery attempt is split into its check and its
//! replay outcome so flushes can interleave with an in-flight replay.
//! Verifies:
//! - NO_FLUSH_WHILE_PENDING: a flush only succeeds once recovery completed or was skipped
//! - SINGLE_COMPLETION: recovery completes (or is skipped) at most once
//! - FAILURE_REARMS: a failed replay leaves the gate pending
//! - REJECTION_PRESERVES_FLAG: an "already recovered" attempt leaves the flag cleared

use stateright::{Model, Property};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecoveryPhase {
    Idle,
    Replaying,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LastOutcome {
    None,
    Completed,
    Failed,
    Rejected,
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GateState {
    pub pending: bool,
    pub phase: RecoveryPhase,
    pub attempts: u8,
    pub completions: u8,
    pub skips: u8,
    pub flushes: u8,
    /// A flush got through while recovery had neither completed nor been skipped
    pub premature_flush: bool,
    pub last: LastOutcome,
    /// Flag value before the most recent rejected attempt
    pub pending_before_rejection: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateAction {
    /// `recover_from_translog` checks the flag
    BeginRecovery,
    /// The replay function returns
    FinishReplay { ok: bool },
    /// `skip_translog_recovery`
    Skip,
    /// `ensure_can_flush` followed by a flush
    Flush,
}

pub struct RecoveryGateModel {
    pub max_attempts: u8,
    pub max_flushes: u8,
}

impl RecoveryGateModel {
    pub fn new(max_attempts: u8, max_flushes: u8) -> Self {
        RecoveryGateModel {
            max_attempts,
            max_flushes,
        }
    }
}

impl Default for RecoveryGateModel {
    fn default() -> Self {
        Self::new(3, 2)
    }
}

impl Model for RecoveryGateModel {
    type State = GateState;
    type Action = GateAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![GateState {
            pending: true,
            phase: RecoveryPhase::Idle,
            attempts: 0,
            completions: 0,
            skips: 0,
            flushes: 0,
            premature_flush: false,
            last: LastOutcome::None,
            pending_before_rejection: None,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        match state.phase {
            RecoveryPhase::Idle => {
                if state.attempts < self.max_attempts {
                    actions.push(GateAction::BeginRecovery);
                }
                // Skipping is only legal while pending
                if state.pending {
                    actions.push(GateAction::Skip);
                }
            }
            RecoveryPhase::Replaying => {
                actions.push(GateAction::FinishReplay { ok: true });
                actions.push(GateAction::FinishReplay { ok: false });
            }
        }
        if state.flushes < self.max_flushes {
            actions.push(GateAction::Flush);
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();

        match action {
            GateAction::BeginRecovery => {
                if next.phase != RecoveryPhase::Idle {
                    return None;
                }
                next.attempts += 1;
                if !next.pending {
                    next.pending_before_rejection = Some(next.pending);
                    next.last = LastOutcome::Rejected;
                } else {
                    next.phase = RecoveryPhase::Replaying;
                }
            }
            GateAction::FinishReplay { ok } => {
                if next.phase != RecoveryPhase::Replaying {
                    return None;
                }
                next.phase = RecoveryPhase::Idle;
                if ok {
                    next.pending = false;
                    next.completions += 1;
                    next.last = LastOutcome::Completed;
                } else {
                    next.pending = true;
                    next.last = LastOutcome::Failed;
                }
            }
            GateAction::Skip => {
                if !next.pending || next.phase != RecoveryPhase::Idle {
                    return None;
                }
                next.pending = false;
                next.skips += 1;
                next.last = LastOutcome::Skipped;
            }
            GateAction::Flush => {
                next.flushes += 1;
                if !next.pending && next.completions + next.skips == 0 {
                    next.premature_flush = true;
                }
            }
        }

        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("no_flush_while_pending", |_: &RecoveryGateModel, state: &GateState| {
                !state.premature_flush
            }),
            Property::always("single_completion", |_: &RecoveryGateModel, state: &GateState| {
                state.completions + state.skips <= 1
            }),
            Property::always("failure_rearms", |_: &RecoveryGateModel, state: &GateState| {
                state.last != LastOutcome::Failed || state.pending
            }),
            Property::always("rejection_preserves_flag", |_: &RecoveryGateModel, state: &GateState| {
                state.last != LastOutcome::Rejected
                    || (state.pending_before_rejection == Some(false) && !state.pending)
            }),
            Property::always("replay_only_while_pending", |_: &RecoveryGateModel, state: &GateState| {
                state.phase != RecoveryPhase::Replaying || state.pending
            }),
            Property::sometimes("recovered_after_failure", |_: &RecoveryGateModel, state: &GateState| {
                state.completions == 1 && state.attempts >= 2
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    fn apply(model: &RecoveryGateModel, state: &GateState, actions: &[GateAction]) -> GateState {
        actions.iter().fold(state.clone(), |s, a| {
            model.next_state(&s, a.clone()).unwrap()
        })
    }

    #[test]
    fn test_failed_replay_keeps_flushes_disabled() {
        let model = RecoveryGateModel::default();
        let init = model.init_states().remove(0);
        let state = apply(
            &model,
            &init,
            &[GateAction::BeginRecovery, GateAction::FinishReplay { ok: false }],
        );
        assert!(state.pending);
        assert_eq!(state.last, LastOutcome::Failed);
    }

    #[test]
    fn test_second_recovery_rejected() {
        let model = RecoveryGateModel::default();
        let init = model.init_states().remove(0);
        let state = apply(
            &model,
            &init,
            &[
                GateAction::BeginRecovery,
                GateAction::FinishReplay { ok: true },
                GateAction::BeginRecovery,
            ],
        );
        assert_eq!(state.last, LastOutcome::Rejected);
        assert_eq!(state.completions, 1);
        assert!(!state.pending);
    }

    #[test]
    fn test_skip_requires_pending() {
        let model = RecoveryGateModel::default();
        let init = model.init_states().remove(0);
        let skipped = apply(&model, &init, &[GateAction::Skip]);
        assert!(model.next_state(&skipped, GateAction::Skip).is_none());
    }

    #[test]
    fn test_small_model_check() {
        let checker = RecoveryGateModel::new(2, 1).checker().spawn_bfs().join();
        checker.assert_properties();
    }

    #[test]
    #[ignore] // Run with: cargo test stateright_recovery_gate -- --ignored --nocapture
    fn stateright_recovery_gate_model_check() {
        let checker = RecoveryGateModel::new(4, 3).checker().spawn_bfs().join();

        println!("States explored: {}", checker.unique_state_count());

        checker.assert_properties();

        println!("Model check passed! All recovery gate invariants hold.");
    }
}
