//! Handler registry
//!
//! Validated [`MethodDescriptor`]s keyed by method name. Backed by a
//! `DashMap`, so registration and lookup may interleave freely across tasks.

pub mod handler;

pub use handler::{Handler, InvokeFuture, Invoker};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::value::RawValue;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::dispatch::ZeroValuePolicy;

/// Prefix JSON-RPC reserves for protocol extensions.
pub const RESERVED_PREFIX: &str = "rpc.";

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("method name must not be empty")]
    EmptyMethodName,

    #[error("method name '{0}' is reserved: names starting with 'rpc.' belong to the protocol")]
    ReservedMethodName(String),

    #[error("parameter type {type_name} cannot be bound from JSON: {reason}")]
    UnbindableParameter {
        type_name: &'static str,
        reason: String,
    },
}

/// Declared parameter of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamShape {
    None,
    Required { type_name: &'static str },
}

/// A validated, immutable handler record.
pub struct MethodDescriptor {
    method: String,
    params: ParamShape,
    result_type: &'static str,
    invoker: Invoker,
}

impl MethodDescriptor {
    /// Validate `handler` and build its descriptor.
    pub fn new<H, Args>(
        method: impl Into<String>,
        handler: H,
        policy: ZeroValuePolicy,
    ) -> Result<Self, ShapeError>
    where
        H: Handler<Args>,
    {
        let method = method.into();
        if method.trim().is_empty() {
            return Err(ShapeError::EmptyMethodName);
        }
        if method.starts_with(RESERVED_PREFIX) {
            return Err(ShapeError::ReservedMethodName(method));
        }
        H::probe()?;

        Ok(Self {
            method,
            params: H::param_shape(),
            result_type: H::result_type(),
            invoker: handler.into_invoker(policy),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> ParamShape {
        self.params
    }

    pub fn result_type(&self) -> &'static str {
        self.result_type
    }

    pub(crate) fn invoke(&self, ctx: Context, params: Option<Box<RawValue>>) -> InvokeFuture {
        (self.invoker)(ctx, params)
    }

    pub fn info(&self) -> MethodInfo {
        MethodInfo {
            method: self.method.clone(),
            params: self.params,
            result: self.result_type,
        }
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("result_type", &self.result_type)
            .finish_non_exhaustive()
    }
}

/// Serializable summary of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodInfo {
    pub method: String,
    pub params: ParamShape,
    pub result: &'static str,
}

pub struct Registry {
    policy: ZeroValuePolicy,
    methods: DashMap<String, Arc<MethodDescriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_policy(ZeroValuePolicy::default())
    }

    pub fn with_policy(policy: ZeroValuePolicy) -> Self {
        Self {
            policy,
            methods: DashMap::new(),
        }
    }

    pub fn policy(&self) -> ZeroValuePolicy {
        self.policy
    }

    /// Validate and store `handler` under `method`, replacing any previous
    /// registration. On error nothing is stored.
    pub fn register<H, Args>(&self, method: impl Into<String>, handler: H) -> Result<(), ShapeError>
    where
        H: Handler<Args>,
    {
        let descriptor = MethodDescriptor::new(method, handler, self.policy)?;
        self.methods
            .insert(descriptor.method.clone(), Arc::new(descriptor));
        Ok(())
    }

    pub fn resolve(&self, method: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods.get(method).map(|entry| entry.value().clone())
    }

    pub fn unregister(&self, method: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods.remove(method).map(|(_, descriptor)| descriptor)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Shapes of all registered methods, sorted by name.
    pub fn describe(&self) -> Vec<MethodInfo> {
        let mut infos: Vec<MethodInfo> = self.methods.iter().map(|e| e.value().info()).collect();
        infos.sort_by(|a, b| a.method.cmp(&b.method));
        infos
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
