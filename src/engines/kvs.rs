use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::engine::{self, TransactionalStore};
use super::errors::{Result, StoreError};
use super::statement::{Statement, WriteSet};

fn filename_of(gen: u64) -> String {
    format!("txseq-data-{}", gen)
}

fn parse_gen(filename: &str) -> Option<u64> {
    lazy_static! {
        static ref PATTERN: Regex = Regex::new(r"^txseq-data-(\d+)$").unwrap();
    }
    PATTERN
        .captures(filename)
        .and_then(|cap| cap[1].parse::<u64>().ok())
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
struct BinLocation {
    gen: u64,
    offset: u64,
    length: u64,
}

macro_rules! bin_loc {
    (Gen[$gen: expr] $start: expr => $len: expr ) => {
        BinLocation {
            gen: $gen,
            offset: $start,
            length: $len,
        }
    };
}

/// One line of a generation file.
///
/// A transaction is written as its `Put`/`Rm` records followed by `Commit`,
/// records without a matching `Commit` are ignored on replay.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
enum LogRecord {
    Put { txn: u64, key: String, value: String },
    Rm { txn: u64, key: String },
    Commit { txn: u64 },
}

impl LogRecord {
    fn txn(&self) -> u64 {
        match self {
            LogRecord::Put { txn, .. } | LogRecord::Rm { txn, .. } | LogRecord::Commit { txn } => {
                *txn
            }
        }
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut serialized = serde_json::to_vec(self)?;
        serialized.push(b'\n');
        Ok(serialized)
    }
}

struct LogWriter {
    file: File,
    gen: u64,
    len: u64,
}

impl LogWriter {
    fn open(dir: impl AsRef<Path>, gen: u64) -> Result<Self> {
        let filename = dir.as_ref().join(filename_of(gen));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)
            .map_err(|e| StoreError::FailToOpenFile {
                file_name: filename_of(gen),
                io_error: e,
            })?;
        let len = file.metadata()?.len();
        Ok(LogWriter { file, gen, len })
    }

    /// append `buf` as a whole and sync it, returning the offset it starts at.
    ///
    /// On failure the file is cut back to its previous length,
    /// so a partial batch never precedes later appends.
    fn append(&mut self, buf: &[u8]) -> Result<u64> {
        let offset = self.len;
        let written = self
            .file
            .write_all(buf)
            .and_then(|_| self.file.sync_data());
        if let Err(io_error) = written {
            if let Err(truncate_error) = self.file.set_len(offset) {
                warn!(target: "app::error",
                      "failed to truncate {} after a failed append: {}", filename_of(self.gen), truncate_error);
            }
            return Err(io_error.into());
        }
        self.len += buf.len() as u64;
        Ok(offset)
    }
}

/// The state recovered from the generation files.
struct Replay {
    index: HashMap<String, BinLocation>,
    stale: u64,
    next_txn: u64,
    active_gen: u64,
    /// length of the last complete line of the active generation.
    active_len: u64,
}

struct LogInner {
    dir: PathBuf,
    index: HashMap<String, BinLocation>,
    writer: LogWriter,
    readers: BTreeMap<u64, File>,
    next_txn: u64,
    stale: u64,
}

impl LogInner {
    fn load_value(&mut self, key: &str, location: BinLocation) -> Result<String> {
        let dir = &self.dir;
        let reader = match self.readers.entry(location.gen) {
            std::collections::btree_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::btree_map::Entry::Vacant(entry) => {
                let file = File::open(dir.join(filename_of(location.gen))).map_err(|e| {
                    StoreError::FailToOpenFile {
                        file_name: filename_of(location.gen),
                        io_error: e,
                    }
                })?;
                entry.insert(file)
            }
        };
        let mut buf = vec![0u8; location.length as usize];
        reader.seek(SeekFrom::Start(location.offset))?;
        reader.read_exact(buf.as_mut_slice())?;
        match serde_json::from_slice(buf.as_slice())? {
            LogRecord::Put { key: found, value, .. } if found == key => Ok(value),
            other => Err(StoreError::Other {
                reason: format!(
                    "index of key {} points to an unexpected record {:?}",
                    key, other
                ),
            }),
        }
    }

    fn commit(&mut self, txn: u64, write_set: WriteSet) -> Result<()> {
        let mut buf = Vec::new();
        let mut located = Vec::with_capacity(write_set.len());
        for (key, value) in write_set.into_changes() {
            let record = match value {
                Some(value) => LogRecord::Put {
                    txn,
                    key: key.clone(),
                    value,
                },
                None => LogRecord::Rm {
                    txn,
                    key: key.clone(),
                },
            };
            let line = record.serialize()?;
            let is_put = matches!(record, LogRecord::Put { .. });
            located.push((key, buf.len() as u64, line.len() as u64, is_put));
            buf.extend_from_slice(&line);
        }
        buf.extend_from_slice(&LogRecord::Commit { txn }.serialize()?);

        let base = self.writer.append(&buf)?;
        let gen = self.writer.gen;
        for (key, relative, length, is_put) in located {
            let old = if is_put {
                self.index
                    .insert(key, bin_loc! { Gen[gen] base + relative => length })
            } else {
                self.stale += length;
                self.index.remove(&key)
            };
            if let Some(old) = old {
                self.stale += old.length;
            }
        }
        // the batch is durable from here on, a failed compaction must not fail the commit.
        if self.stale > LogStore::COMPACTION_THRESHOLD {
            if let Err(err) = self.compact() {
                error!(target: "app::error", "compaction after transaction {} failed: {}", txn, err);
            }
        }
        Ok(())
    }

    /// rewrite every live key into a fresh generation as one committed batch,
    /// then drop the older generations.
    fn compact(&mut self) -> Result<()> {
        let gen = self.writer.gen + 1;
        let txn = self.next_txn;
        self.next_txn += 1;

        let live: Vec<(String, BinLocation)> = self
            .index
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        let mut buf = Vec::new();
        let mut located = Vec::with_capacity(live.len());
        for (key, location) in live {
            let value = self.load_value(&key, location)?;
            let line = LogRecord::Put {
                txn,
                key: key.clone(),
                value,
            }
            .serialize()?;
            located.push((key, buf.len() as u64, line.len() as u64));
            buf.extend_from_slice(&line);
        }
        buf.extend_from_slice(&LogRecord::Commit { txn }.serialize()?);

        let mut writer = LogWriter::open(&self.dir, gen)?;
        let base = writer.append(&buf)?;
        for (key, relative, length) in located {
            self.index
                .insert(key, bin_loc! { Gen[gen] base + relative => length });
        }
        self.writer = writer;
        self.stale = 0;

        self.readers.clear();
        for (path, old) in LogStore::enumerate_gen_files(&self.dir) {
            if old < gen {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(target: "app::error", "failed to remove {}: {}", path.display(), e);
                }
            }
        }
        info!("log store compacted into generation {}", gen);
        Ok(())
    }
}

/// The log-structured store.
///
/// Committed transactions are appended to `txseq-data-<gen>` files as JSON lines,
/// an in-memory index maps every live key to the location of its last `Put`.
/// Obsolete bytes are counted, and past `COMPACTION_THRESHOLD` the live keys
/// are rewritten into a new generation.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<Mutex<LogInner>>,
}

/// The transaction of `LogStore`.
pub struct LogTransaction {
    id: u64,
    write_set: WriteSet,
}

impl LogTransaction {
    /// the log-wide number of this transaction.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl LogStore {
    const COMPACTION_THRESHOLD: u64 = 1024 * 1024 * 8; // 8MB

    fn enumerate_gen_files(p: impl AsRef<Path>) -> Vec<(PathBuf, u64)> {
        let mut files: Vec<(PathBuf, u64)> = WalkDir::new(p)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(parse_gen)
                    .map(|gen| (entry.path().to_owned(), gen))
            })
            .collect();
        files.sort_by_key(|(_, gen)| *gen);
        files
    }

    /// build the in-memory index from the generation files.
    fn build_index(path: impl AsRef<Path>) -> Result<Replay> {
        let mut replay = Replay {
            index: HashMap::new(),
            stale: 0,
            next_txn: 1,
            active_gen: 1,
            active_len: 0,
        };

        for (filename, gen) in LogStore::enumerate_gen_files(path) {
            replay.active_gen = gen;
            replay.active_len = 0;
            let mut reader = BufReader::new(File::open(&filename)?);
            let mut pending: HashMap<u64, Vec<(LogRecord, BinLocation)>> = HashMap::new();
            let mut buf = Vec::new();
            let mut offset = 0u64;
            loop {
                buf.clear();
                let n = reader.read_until(b'\n', &mut buf)?;
                if n == 0 {
                    break;
                }
                if buf.last() != Some(&b'\n') {
                    warn!(target: "app::error",
                          "ignoring {} torn bytes at the tail of {}", n, filename.display());
                    break;
                }
                let record: LogRecord = serde_json::from_slice(&buf[..n - 1])?;
                let location = bin_loc! { Gen[gen] offset => n as u64 };
                offset += n as u64;
                replay.active_len = offset;
                replay.next_txn = replay.next_txn.max(record.txn() + 1);

                match record {
                    LogRecord::Commit { txn } => {
                        for (record, location) in pending.remove(&txn).unwrap_or_default() {
                            let old = match record {
                                LogRecord::Put { key, .. } => replay.index.insert(key, location),
                                LogRecord::Rm { key, .. } => {
                                    replay.stale += location.length;
                                    replay.index.remove(&key)
                                }
                                LogRecord::Commit { .. } => None,
                            };
                            if let Some(old) = old {
                                replay.stale += old.length;
                            }
                        }
                    }
                    record => pending
                        .entry(record.txn())
                        .or_insert_with(Vec::new)
                        .push((record, location)),
                }
            }
            if !pending.is_empty() {
                debug!(
                    "{} uncommitted transaction(s) skipped in {}",
                    pending.len(),
                    filename.display()
                );
            }
        }
        Ok(replay)
    }

    /// open a log store in the directory `path`, replaying its generation files.
    ///
    /// # Error
    ///
    /// If failed to open file, a `FailToOpenFile` will be thrown;
    /// a complete but malformed line gives `FailToParseFile`,
    /// a directory used by another engine gives `IllegalWorkingDirectory`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        engine::check_engine(path.as_ref(), "log")?;
        let replay = LogStore::build_index(path.as_ref())?;

        // a torn tail would otherwise be glued onto the next append.
        let active = path.as_ref().join(filename_of(replay.active_gen));
        if let Ok(meta) = std::fs::metadata(&active) {
            if meta.len() > replay.active_len {
                OpenOptions::new()
                    .write(true)
                    .open(&active)?
                    .set_len(replay.active_len)?;
            }
        }

        let writer = LogWriter::open(path.as_ref(), replay.active_gen)?;
        info!(
            "log store opened at {} with {} live key(s), generation {}",
            path.as_ref().display(),
            replay.index.len(),
            replay.active_gen
        );
        let inner = LogInner {
            dir: path.as_ref().to_owned(),
            index: replay.index,
            writer,
            readers: BTreeMap::new(),
            next_txn: replay.next_txn,
            stale: replay.stale,
        };
        Ok(LogStore {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Compact the log now.
    /// This rewrites the last value of every live key into a new generation file,
    /// so that the log will not grow too fast.
    pub fn compact(&self) -> Result<()> {
        self.inner.lock()?.compact()
    }

    fn read_committed(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock()?;
        match inner.index.get(key).copied() {
            Some(location) => inner.load_value(key, location).map(Some),
            None => Ok(None),
        }
    }
}

impl TransactionalStore for LogStore {
    type Transaction = LogTransaction;

    fn begin(&self) -> Result<LogTransaction> {
        let mut inner = self.inner.lock()?;
        let id = inner.next_txn;
        inner.next_txn += 1;
        Ok(LogTransaction {
            id,
            write_set: WriteSet::new(),
        })
    }

    fn execute(&self, txn: &mut LogTransaction, statement: &Statement) -> Result<u64> {
        txn.write_set
            .apply(statement, |key| self.read_committed(key))
    }

    fn commit(&self, txn: LogTransaction) -> Result<()> {
        if txn.write_set.is_empty() {
            return Ok(());
        }
        debug!("log store: committing transaction {}", txn.id);
        self.inner.lock()?.commit(txn.id, txn.write_set)
    }

    fn rollback(&self, txn: LogTransaction) -> Result<()> {
        debug!("log store: discarding transaction {}", txn.id);
        Ok(())
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        self.read_committed(&key)
    }
}
