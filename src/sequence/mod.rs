//! The transactional update sequencer.
//!
//! A sequence is an ordered list of `Operation`s run in one transaction.
//! It commits only if every operation changed exactly the number of records
//! it expected; on the first error or mismatch the rest of the sequence is
//! skipped and the transaction is rolled back.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::engines::engine::TransactionalStore;
use crate::engines::statement::Statement;

pub use self::errors::{FailureKind, Result, RollbackOutcome, TransactionFailure};
pub use self::guard::TransactionGuard;

mod errors;
mod guard;

/// a statement plus the number of records it must change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub statement: Statement,
    /// the expected effect count.
    pub expect: u64,
}

impl Operation {
    pub fn new(statement: Statement, expect: u64) -> Self {
        Operation { statement, expect }
    }

    /// an `update` that must hit exactly one existing record.
    pub fn update_one(key: impl Into<String>, value: impl Into<String>) -> Self {
        Operation::new(
            Statement::Update {
                key: key.into(),
                value: value.into(),
            },
            1,
        )
    }

    /// an `insert` of one new record.
    pub fn insert_one(key: impl Into<String>, value: impl Into<String>) -> Self {
        Operation::new(
            Statement::Insert {
                key: key.into(),
                value: value.into(),
            },
            1,
        )
    }

    /// a `delete` that must remove exactly one existing record.
    pub fn delete_one(key: impl Into<String>) -> Self {
        Operation::new(Statement::Delete { key: key.into() }, 1)
    }
}

/// The outcome of a committed sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// the effect count of every operation, in sequence order.
    pub effects: Vec<u64>,
}

impl Committed {
    pub fn total_effect(&self) -> u64 {
        self.effects.iter().sum()
    }
}

static NEXT_RUN: AtomicU64 = AtomicU64::new(1);

/// Run `operations` in order inside a fresh transaction of `store`.
///
/// ```rust
/// # use txseq::engines::memory::MemoryStore;
/// # use txseq::sequence::{run_sequence, Operation};
/// let store = MemoryStore::with_entries(vec![("user:1:age", "18")]);
/// let committed = run_sequence(&store, &[Operation::update_one("user:1:age", "20")]).unwrap();
/// assert_eq!(committed.effects, vec![1]);
/// ```
///
/// # Error
///
/// `ExecutionError` or `EffectMismatch` name the 1-based position of the operation
/// that aborted the sequence; the transaction is rolled back before they are returned,
/// and a failed rollback is carried along in the error.
/// `CommitError` means every operation passed but the store failed to commit.
///
/// A panic inside the store still rolls the transaction back before it propagates.
pub fn run_sequence<S: TransactionalStore>(store: &S, operations: &[Operation]) -> Result<Committed> {
    if operations.is_empty() {
        return Err(TransactionFailure::EmptySequence);
    }
    let run = NEXT_RUN.fetch_add(1, Ordering::SeqCst);
    let _mdc = log_mdc::insert_scoped("txn", run.to_string());
    debug!("running a sequence of {} operation(s)", operations.len());

    let mut guard =
        TransactionGuard::begin(store).map_err(|cause| TransactionFailure::BeginError { cause })?;
    let mut effects = Vec::with_capacity(operations.len());
    for (index, operation) in operations.iter().enumerate() {
        let position = index + 1;
        let actual = match guard.execute(&operation.statement) {
            Ok(actual) => actual,
            Err(cause) => {
                warn!("operation #{} failed: {}", position, cause);
                return Err(TransactionFailure::ExecutionError {
                    position,
                    cause,
                    rollback: guard.rollback().into(),
                });
            }
        };
        if actual != operation.expect {
            warn!(
                "operation #{} affected {} record(s), expected {}",
                position, actual, operation.expect
            );
            return Err(TransactionFailure::EffectMismatch {
                position,
                expected: operation.expect,
                actual,
                rollback: guard.rollback().into(),
            });
        }
        effects.push(actual);
    }

    guard
        .commit()
        .map_err(|cause| TransactionFailure::CommitError { cause })?;
    info!("sequence of {} operation(s) committed", effects.len());
    Ok(Committed { effects })
}
