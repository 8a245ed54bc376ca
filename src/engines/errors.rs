use std::sync::PoisonError;

use failure::Fail;

/// The result type used in the `TransactionalStore` context.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The error type of the store layer.
/// It has some variants that wrap other types, like `std::io::Error`, `serde_json::Error`.
/// This error type implements the `From` trait of those error types.
#[derive(Debug, Fail)]
pub enum StoreError {
    #[fail(
        display = "Failed to open file {} because error [{}].",
        file_name, io_error
    )]
    /// failed to open a data file.
    FailToOpenFile {
        /// the filename which failed to open.
        file_name: String,
        #[cause]
        /// the underlying io exception.
        io_error: std::io::Error,
    },
    #[fail(
        display = "Failed because some unexpected IO exception [{}].",
        io_error
    )]
    /// generic io exception, like broken pipe, removed file.
    OtherIOException {
        #[cause]
        /// the inner error.
        io_error: std::io::Error,
    },
    #[fail(display = "Failed to parse file because error [{}]", serde_error)]
    /// the store met a malformed data file.
    FailToParseFile {
        #[cause]
        /// the inner error.
        serde_error: serde_json::Error,
    },
    /// `insert` on a key that is already present.
    #[fail(display = "constraint violation: key {} already exists", key)]
    ConstraintViolation {
        /// the conflicting key.
        key: String,
    },
    /// `incr` on a value that isn't an integer.
    #[fail(display = "value of key {} is not an integer", key)]
    NotAnInteger {
        /// the offending key.
        key: String,
    },
    /// `incr` would leave the i64 range.
    #[fail(display = "increment of key {} overflows", key)]
    IntegerOverflow {
        /// the offending key.
        key: String,
    },
    #[fail(
        display = "illegal working directory: it belongs to engine {}, not {}.",
        found, expected
    )]
    /// the directory was stamped by another engine.
    IllegalWorkingDirectory {
        /// the engine that tried to open the directory.
        expected: String,
        /// the engine recorded in the directory.
        found: String,
    },
    /// the transaction was already committed or rolled back.
    #[fail(display = "transaction is already closed")]
    TransactionClosed,
    #[fail(display = "when operate with lock, something bad happens.")]
    /// a lock was poisoned by a panicking holder.
    ConcurrentError,
    #[fail(display = "other exception: {}", reason)]
    /// anything else, mostly errors of the backing library.
    Other {
        /// the description of the error.
        reason: String,
    },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::FailToParseFile { serde_error: err }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(io_error: std::io::Error) -> Self {
        StoreError::OtherIOException { io_error }
    }
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        StoreError::ConcurrentError
    }
}
