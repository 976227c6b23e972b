//! Methods every daemon exposes

use std::sync::{Arc, Weak};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use rpcwire_core::ProtocolError;

use crate::context::Context;
use crate::registry::{MethodInfo, Registry, ShapeError};
use crate::server::Server;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddParams {
    #[serde(default)]
    pub a: i64,
    #[serde(default)]
    pub b: i64,
}

pub async fn ping(_ctx: Context) -> Result<&'static str, ProtocolError> {
    Ok("pong")
}

pub async fn echo(_ctx: Context, message: String) -> Result<String, ProtocolError> {
    Ok(message)
}

pub async fn add(_ctx: Context, params: AddParams) -> anyhow::Result<i64> {
    params
        .a
        .checked_add(params.b)
        .ok_or_else(|| anyhow!("integer overflow adding {} and {}", params.a, params.b))
}

fn upgrade(registry: &Weak<Registry>) -> Result<Arc<Registry>, ProtocolError> {
    registry
        .upgrade()
        .ok_or_else(ProtocolError::internal_error)
}

/// Register `system.ping`, `system.methods`, `system.describe`, `echo` and `math.add`.
pub fn register_builtins(server: &Server) -> Result<(), ShapeError> {
    server.register("system.ping", ping)?;
    server.register("echo", echo)?;
    server.register("math.add", add)?;

    // Weak, so the registry does not own itself through these handlers.
    let registry = Arc::downgrade(server.registry());
    server.register("system.methods", move |_ctx: Context| {
        let registry = upgrade(&registry).map(|registry| registry.methods());
        async move { registry }
    })?;

    let registry = Arc::downgrade(server.registry());
    server.register("system.describe", move |_ctx: Context| {
        let described: Result<Vec<MethodInfo>, ProtocolError> =
            upgrade(&registry).map(|registry| registry.describe());
        async move { described }
    })?;

    Ok(())
}
