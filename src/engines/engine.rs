use std::io::{Read, Write};
use std::path::Path;

use super::errors::{Result, StoreError};
use super::statement::Statement;

const ENGINE_MARKER: &str = ".engine";

/// stamp `path` with `engine_name`, or check that it already carries that stamp.
pub(crate) fn check_engine<P: AsRef<Path>>(path: P, engine_name: &str) -> Result<()> {
    let marker = path.as_ref().join(ENGINE_MARKER);
    if std::fs::metadata(&marker).is_err() {
        std::fs::create_dir_all(path.as_ref())?;
        let mut f = std::fs::File::create(&marker)?;
        f.write_all(engine_name.as_bytes())?;
    }
    let mut f = std::fs::File::open(&marker)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let found = buf.trim().to_lowercase();
    if found != engine_name {
        return Err(StoreError::IllegalWorkingDirectory {
            expected: engine_name.to_owned(),
            found,
        });
    }
    Ok(())
}

/// The transactional store consumed by the sequencer.
///
/// This is a sub-trait of `Send` and `Clone`, so that it can be simply sent between threads.
/// It guarantees that it's cheap to `Clone` it, so you needn't share it with `Arc`:
/// every clone sees the same data.
///
/// A `Transaction` buffers its writes privately. Nothing it does is visible
/// to `get` or to other transactions until `commit`; `rollback` discards it.
pub trait TransactionalStore: Send + Clone + 'static {
    /// the handle scoping a sequence of statements until commit or rollback.
    type Transaction: Send;

    /// open a new transaction.
    fn begin(&self) -> Result<Self::Transaction>;

    /// run one statement inside `txn`, returning the number of records it changed.
    ///
    /// # Error
    ///
    /// Statement level failures, like `ConstraintViolation` on `insert`,
    /// leave the transaction usable, the caller decides whether to roll back.
    fn execute(&self, txn: &mut Self::Transaction, statement: &Statement) -> Result<u64>;

    /// atomically persist every write of `txn`.
    fn commit(&self, txn: Self::Transaction) -> Result<()>;

    /// drop every write of `txn`.
    fn rollback(&self, txn: Self::Transaction) -> Result<()>;

    /// read a committed value.
    /// when the key not exists, return `None`.
    fn get(&self, key: String) -> Result<Option<String>>;
}
