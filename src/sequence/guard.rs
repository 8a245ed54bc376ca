use std::thread;

use log::{debug, error, warn};

use crate::engines::engine::TransactionalStore;
use crate::engines::errors::{Result, StoreError};
use crate::engines::statement::Statement;

/// An open transaction that is released on every exit path.
///
/// `commit` and `rollback` consume the guard. If it is dropped while still open,
/// early return or unwinding from a panic alike, the transaction is rolled back
/// before control leaves the scope.
pub struct TransactionGuard<'s, S: TransactionalStore> {
    store: &'s S,
    txn: Option<S::Transaction>,
}

impl<'s, S: TransactionalStore> TransactionGuard<'s, S> {
    pub fn begin(store: &'s S) -> Result<Self> {
        let txn = store.begin()?;
        debug!("transaction begun");
        Ok(TransactionGuard {
            store,
            txn: Some(txn),
        })
    }

    /// run one statement in the guarded transaction.
    pub fn execute(&mut self, statement: &Statement) -> Result<u64> {
        match self.txn.as_mut() {
            Some(txn) => self.store.execute(txn, statement),
            None => Err(StoreError::TransactionClosed),
        }
    }

    pub fn commit(mut self) -> Result<()> {
        let txn = self.txn.take().ok_or(StoreError::TransactionClosed)?;
        self.store.commit(txn)?;
        debug!("transaction committed");
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        let txn = self.txn.take().ok_or(StoreError::TransactionClosed)?;
        self.store.rollback(txn)?;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl<'s, S: TransactionalStore> Drop for TransactionGuard<'s, S> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            if thread::panicking() {
                warn!(target: "app::error", "panicked inside a transaction, rolling back");
            }
            match self.store.rollback(txn) {
                Ok(()) => debug!("unfinished transaction rolled back"),
                Err(err) => error!(target: "app::error", "failed to roll back an unfinished transaction: {}", err),
            }
        }
    }
}
