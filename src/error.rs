//! Domain error taxonomy for the rotation engine.
//!
//! These are the errors the core can return to a caller. `InvariantViolation`
//! is the one variant that should never be produced by correct input; every
//! other variant is an expected outcome of a caller request and carries no
//! special handling beyond being surfaced.

use thiserror::Error;

use crate::models::{Lane, RepId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("reorder is not a permutation of the currently eligible reps for {lane:?}")]
    InvalidOrder { lane: Lane },

    #[error("lane mismatch: expected {expected:?}, got {actual:?}")]
    LaneMismatch { expected: Lane, actual: Lane },

    #[error("replacement lead's rep {got:?} does not match the original mark's rep {expected:?}")]
    AssignmentMismatch { expected: RepId, got: RepId },

    #[error("mark for lead {lead_id} is already closed")]
    MarkAlreadyClosed { lead_id: String },

    #[error("fulfill lost the race: mark for lead {lead_id} was already closed by another writer")]
    MarkAlreadyOpen { lead_id: String },

    #[error("cannot delete lead {lead_id}: its replacement must be deleted first")]
    DeleteBlocked { lead_id: String },

    #[error("no eligible rep found for lane {lane:?}")]
    NoEligibleRep { lane: Lane },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
