use std::fmt;

use failure::Fail;
use serde::{Deserialize, Serialize};

use crate::engines::errors::StoreError;

/// What happened to the transaction after a sequence was aborted.
#[derive(Debug)]
pub enum RollbackOutcome {
    /// every write was discarded.
    RolledBack,
    /// the rollback itself failed; this never replaces the abort reason.
    Failed(StoreError),
}

impl From<std::result::Result<(), StoreError>> for RollbackOutcome {
    fn from(result: std::result::Result<(), StoreError>) -> Self {
        match result {
            Ok(()) => RollbackOutcome::RolledBack,
            Err(err) => RollbackOutcome::Failed(err),
        }
    }
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackOutcome::RolledBack => write!(f, "rolled back"),
            RollbackOutcome::Failed(err) => write!(f, "rollback also failed: {}", err),
        }
    }
}

/// The failure of one `run_sequence` call.
///
/// `position` is the 1-based ordinal of the offending operation.
#[derive(Debug, Fail)]
pub enum TransactionFailure {
    /// nothing to run; no transaction was begun.
    #[fail(display = "empty sequence, nothing to run")]
    EmptySequence,
    /// the store refused to open a transaction.
    #[fail(display = "failed to begin transaction: {}", cause)]
    BeginError {
        #[cause]
        cause: StoreError,
    },
    /// the store failed to run an operation.
    #[fail(display = "operation #{} failed: {}; {}", position, cause, rollback)]
    ExecutionError {
        position: usize,
        #[cause]
        cause: StoreError,
        rollback: RollbackOutcome,
    },
    /// an operation ran, but changed another number of records than expected.
    #[fail(
        display = "effect mismatch on operation #{}: expected {} record(s), affected {}; {}",
        position, expected, actual, rollback
    )]
    EffectMismatch {
        position: usize,
        expected: u64,
        actual: u64,
        rollback: RollbackOutcome,
    },
    /// every operation passed, but the final commit failed.
    #[fail(display = "failed to commit: {}", cause)]
    CommitError {
        #[cause]
        cause: StoreError,
    },
}

/// The flat kind of a `TransactionFailure`, as reported over the wire.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptySequence,
    BeginError,
    ExecutionError,
    EffectMismatch,
    CommitError,
}

impl TransactionFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            TransactionFailure::EmptySequence => FailureKind::EmptySequence,
            TransactionFailure::BeginError { .. } => FailureKind::BeginError,
            TransactionFailure::ExecutionError { .. } => FailureKind::ExecutionError,
            TransactionFailure::EffectMismatch { .. } => FailureKind::EffectMismatch,
            TransactionFailure::CommitError { .. } => FailureKind::CommitError,
        }
    }

    /// the 1-based position of the operation that aborted the sequence, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            TransactionFailure::ExecutionError { position, .. }
            | TransactionFailure::EffectMismatch { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// the secondary failure of the rollback that followed the abort.
    pub fn rollback_error(&self) -> Option<&StoreError> {
        match self {
            TransactionFailure::ExecutionError { rollback, .. }
            | TransactionFailure::EffectMismatch { rollback, .. } => match rollback {
                RollbackOutcome::Failed(err) => Some(err),
                RollbackOutcome::RolledBack => None,
            },
            _ => None,
        }
    }
}

/// the result type of the sequencer.
pub type Result<T> = std::result::Result<T, TransactionFailure>;
