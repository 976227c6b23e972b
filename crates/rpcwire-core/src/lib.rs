//! rpcwire core
//!
//! Wire types, the envelope codec and the protocol error taxonomy shared by
//! the daemon and its clients, plus the configuration model.

pub mod codec;
pub mod error;
pub mod models;
pub mod protocol;
pub mod storage;

pub use codec::DecodeError;
pub use error::{Error, Result};
pub use protocol::{codes, Payload, ProtocolError, Request, RequestId, Response};
