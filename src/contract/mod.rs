pub use self::errors::{Error, Result};
pub use self::message::{parse, to_binary, Request, Response};

mod errors;
mod message;
