use std::path::Path;

use log::debug;
use sled::{Batch, Db};
use sled::Error::Io;

use super::engine::{self, TransactionalStore};
use super::errors::{Result, StoreError};
use super::statement::{Statement, WriteSet};

/// The store backed by `sled`.
/// A transaction is a write set, committed as one `sled::Batch`.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

/// The transaction of `SledStore`.
pub struct SledTransaction {
    write_set: WriteSet,
}

impl From<sled::Error> for StoreError {
    fn from(error: sled::Error) -> StoreError {
        StoreError::Other {
            reason: format!("{}", error),
        }
    }
}

fn decode(key: &str, raw: &[u8]) -> Result<String> {
    String::from_utf8(raw.to_vec()).map_err(|utf8_error| StoreError::Other {
        reason: format!(
            "decode value of {} from sled binary failed since: {}",
            key, utf8_error
        ),
    })
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        engine::check_engine(path.as_ref(), "sled")?;

        sled::open(path.as_ref())
            .map(|db| SledStore { db })
            .map_err(|err| {
                if let Io(io_error) = err {
                    StoreError::FailToOpenFile {
                        file_name: path.as_ref().to_str().unwrap_or("Unknown").to_owned(),
                        io_error,
                    }
                } else {
                    StoreError::Other {
                        reason: format!("{}", err),
                    }
                }
            })
    }

    fn read_committed(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key)? {
            Some(v) => decode(key, &v).map(Some),
            None => Ok(None),
        }
    }
}

impl TransactionalStore for SledStore {
    type Transaction = SledTransaction;

    fn begin(&self) -> Result<SledTransaction> {
        Ok(SledTransaction {
            write_set: WriteSet::new(),
        })
    }

    fn execute(&self, txn: &mut SledTransaction, statement: &Statement) -> Result<u64> {
        txn.write_set
            .apply(statement, |key| self.read_committed(key))
    }

    fn commit(&self, txn: SledTransaction) -> Result<()> {
        if txn.write_set.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::default();
        for (key, value) in txn.write_set.into_changes() {
            match value {
                Some(value) => batch.insert(key.as_bytes(), value.as_bytes()),
                None => batch.remove(key.as_bytes()),
            }
        }
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        debug!("sled store: batch applied");
        Ok(())
    }

    fn rollback(&self, txn: SledTransaction) -> Result<()> {
        debug!("sled store: discarding {} key(s)", txn.write_set.len());
        Ok(())
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        self.read_committed(&key)
    }
}
