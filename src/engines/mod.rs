/// the store abstraction.
pub mod engine;
/// the error type.
pub mod errors;
/// the log-structured file store (default).
pub mod kvs;
/// the in-memory store.
pub mod memory;
/// the sled store.
pub mod sled;
/// statements and the transaction write set.
pub mod statement;
