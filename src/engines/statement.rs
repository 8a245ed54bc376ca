use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::{Result, StoreError};

/// A mutating statement against the key-value store.
///
/// Executing a statement yields its *effect count*: the number of records it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// put the value whatever the key holds. Always affects 1 record.
    Set { key: String, value: String },
    /// put the value, the key must not exist yet.
    Insert { key: String, value: String },
    /// replace the value of an existing key. Affects 0 records when the key is missing.
    Update { key: String, value: String },
    /// remove the key. Affects 0 records when the key is missing.
    Delete { key: String },
    /// add `by` to the integer stored at the key; a missing key counts as 0.
    Incr { key: String, by: i64 },
}

impl Statement {
    /// the key this statement touches.
    pub fn key(&self) -> &str {
        match self {
            Statement::Set { key, .. }
            | Statement::Insert { key, .. }
            | Statement::Update { key, .. }
            | Statement::Delete { key }
            | Statement::Incr { key, .. } => key.as_str(),
        }
    }
}

/// The private buffer of a transaction.
///
/// `None` marks a staged removal. Reads go to the staged writes first,
/// then to the committed state supplied by the store.
#[derive(Debug, Default, Clone)]
pub struct WriteSet {
    staged: BTreeMap<String, Option<String>>,
}

impl WriteSet {
    pub fn new() -> Self {
        WriteSet::default()
    }

    /// evaluate `statement` on top of this write set, staging its writes.
    ///
    /// `committed` is consulted only when the key hasn't been written by this transaction.
    pub fn apply<F>(&mut self, statement: &Statement, committed: F) -> Result<u64>
    where
        F: FnOnce(&str) -> Result<Option<String>>,
    {
        let key = statement.key();
        let current = match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => committed(key)?,
        };
        match statement {
            Statement::Set { key, value } => {
                self.stage(key, Some(value.clone()));
                Ok(1)
            }
            Statement::Insert { key, value } => {
                if current.is_some() {
                    return Err(StoreError::ConstraintViolation { key: key.clone() });
                }
                self.stage(key, Some(value.clone()));
                Ok(1)
            }
            Statement::Update { key, value } => match current {
                Some(_) => {
                    self.stage(key, Some(value.clone()));
                    Ok(1)
                }
                None => Ok(0),
            },
            Statement::Delete { key } => match current {
                Some(_) => {
                    self.stage(key, None);
                    Ok(1)
                }
                None => Ok(0),
            },
            Statement::Incr { key, by } => {
                let base = match current {
                    Some(value) => value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| StoreError::NotAnInteger { key: key.clone() })?,
                    None => 0,
                };
                let next = base
                    .checked_add(*by)
                    .ok_or_else(|| StoreError::IntegerOverflow { key: key.clone() })?;
                self.stage(key, Some(next.to_string()));
                Ok(1)
            }
        }
    }

    fn stage(&mut self, key: &str, value: Option<String>) {
        self.staged.insert(key.to_owned(), value);
    }

    /// the staged state of `key`, if this transaction wrote it.
    pub fn staged(&self, key: &str) -> Option<&Option<String>> {
        self.staged.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// consume the write set, yielding the final state of every touched key.
    pub fn into_changes(self) -> impl Iterator<Item = (String, Option<String>)> {
        self.staged.into_iter()
    }
}
