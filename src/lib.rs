//! Transactional update sequences over pluggable key-value stores.

pub use engines::engine::TransactionalStore;
pub use engines::errors::{Result, StoreError};
pub use engines::kvs::LogStore;
pub use engines::memory::MemoryStore;
pub use engines::statement::Statement;
pub use sequence::{run_sequence, Committed, Operation, TransactionFailure};

/// Settings and logger setup.
pub mod config;
/// About the TCP-based contract.
pub mod contract;
/// About the store abstraction.
pub mod engines;
/// The transactional update sequencer.
pub mod sequence;
/// The threaded server.
pub mod server;
/// Engine and pool selection, server errors.
pub mod server_common;
/// Thread pools serving connections.
pub mod thread_pool;
