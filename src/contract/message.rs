use std::io::Read;

use log::error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::sequence::{FailureKind, Operation, TransactionFailure};

use super::{Error, Result};

/// A request sent to the server.
/// One JSON document per connection, the client half-closes after writing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// run the operations as one transactional sequence.
    Run {
        /// the sequence, in order.
        operations: Vec<Operation>,
    },
    /// read a committed value.
    Get {
        /// the key to get.
        key: String,
    },
    /// ask for the server name and version.
    Version,
}

/// The answer to a `Request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// the sequence committed.
    Committed {
        /// the effect count of every operation.
        effects: Vec<u64>,
    },
    /// the value of a `get`, `None` when the key is missing.
    Value { value: Option<String> },
    /// the server identity.
    Version { name: String, version: String },
    /// the sequence was aborted.
    Failed {
        kind: FailureKind,
        /// 1-based position of the offending operation.
        position: Option<usize>,
        /// human readable reason, including any rollback failure.
        reason: String,
    },
    /// the request couldn't be served.
    Error { reason: String },
}

impl From<&TransactionFailure> for Response {
    fn from(failure: &TransactionFailure) -> Self {
        Response::Failed {
            kind: failure.kind(),
            position: failure.position(),
            reason: format!("{}", failure),
        }
    }
}

/// parse a contract message from a stream.
///
/// ```rust
/// # use txseq::contract::{parse, to_binary, Request};
/// let bin = to_binary(&Request::Get { key: "hello".to_owned() }).unwrap();
/// let request: Request = parse(bin.as_slice()).unwrap();
/// assert_eq!(request, Request::Get { key: "hello".to_owned() });
/// ```
///
/// # Error
///
/// if the binary format isn't right, throw `MalformedBinary`.
pub fn parse<T: DeserializeOwned>(mut raw: impl Read) -> Result<T> {
    serde_json::from_reader(&mut raw).map_err(|err| {
        error!(target: "app::error", "failed to parse message, exception: {}.", err);
        Error::MalformedBinary
    })
}

/// serialize a message into binary form.
/// Even now it's just simply JSON text(!).
pub fn to_binary<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|serde_error| Error::Unserializable { serde_error })
}
