use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use log::debug;

use super::engine::TransactionalStore;
use super::errors::Result;
use super::statement::{Statement, WriteSet};

/// An in-memory store, all clones share one ordered map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, String>>>,
}

/// The transaction of `MemoryStore`, just a write set.
pub struct MemoryTransaction {
    write_set: WriteSet,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// build a store holding `entries` as already committed data.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        MemoryStore {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// a copy of the committed state.
    pub fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.data.read()?.clone())
    }
}

impl TransactionalStore for MemoryStore {
    type Transaction = MemoryTransaction;

    fn begin(&self) -> Result<MemoryTransaction> {
        Ok(MemoryTransaction {
            write_set: WriteSet::new(),
        })
    }

    fn execute(&self, txn: &mut MemoryTransaction, statement: &Statement) -> Result<u64> {
        txn.write_set
            .apply(statement, |key| Ok(self.data.read()?.get(key).cloned()))
    }

    fn commit(&self, txn: MemoryTransaction) -> Result<()> {
        let mut data = self.data.write()?;
        debug!("memory store: committing {} key(s)", txn.write_set.len());
        for (key, value) in txn.write_set.into_changes() {
            match value {
                Some(value) => data.insert(key, value),
                None => data.remove(&key),
            };
        }
        Ok(())
    }

    fn rollback(&self, txn: MemoryTransaction) -> Result<()> {
        debug!("memory store: discarding {} key(s)", txn.write_set.len());
        Ok(())
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        Ok(self.data.read()?.get(&key).cloned())
    }
}
