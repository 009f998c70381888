//! Stateright Model Checking for shard-translog
//!
//! Exhaustive state-space exploration of the two small protocols whose
//! correctness the rest of the crate leans on.
//!
//! ## Available Models
//!
//! - `transfer_state`: per-file transfer state machine under interleaved reporters
//! - `recovery_gate`: pending-recovery flag, replay failures, and flush gating
//!
//! ## Running Model Checks
//!
//! ```bash
//! # Exhaustive runs are marked #[ignore]
//! cargo test stateright -- --ignored --nocapture
//! ```
//!
//! | Model | Key Invariants |
//! |-------|----------------|
//! | `TransferStateModel` | forward-only, DELETED absorbing, one acknowledged delete |
//! | `RecoveryGateModel` | no flush while pending, recovery completes at most once |

pub mod recovery_gate;
pub mod transfer_state;

pub use recovery_gate::RecoveryGateModel;
pub use transfer_state::TransferStateModel;
