//! rpcwire daemon library
//!
//! Handler registry, dispatcher and response assembly, plus the unix socket
//! transport used by the `rpcwired` binary.

pub mod builtin;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod ipc;
pub mod registry;
pub mod server;

pub use context::Context;
pub use dispatch::{DispatchError, ZeroValuePolicy};
pub use error::FaultKind;
pub use ipc::IpcServer;
pub use registry::{Handler, MethodDescriptor, ParamShape, Registry, ShapeError};
pub use server::Server;
