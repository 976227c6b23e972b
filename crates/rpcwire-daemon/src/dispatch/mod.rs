//! Parameter binding, handler invocation and outcome classification

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;

use rpcwire_core::{ProtocolError, Request};

use crate::context::Context;
use crate::error::FaultKind;
use crate::registry::MethodDescriptor;

/// What to do with a parameter that decodes to its type's default value.
///
/// `Reject` is the historical behavior: `{}` for a struct, `0` for a number
/// or `""` for a string all fail as invalid params, even when the caller
/// meant them. `Accept` binds them like any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroValuePolicy {
    #[default]
    Reject,
    Accept,
}

/// Why a single dispatch failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("application error: {0}")]
    Application(ProtocolError),

    #[error("result encoding failed: {0}")]
    Encoding(#[source] serde_json::Error),
}

impl DispatchError {
    pub fn kind(&self) -> FaultKind {
        match self {
            DispatchError::InvalidParams(_) => FaultKind::ParamBinding,
            DispatchError::Application(_) => FaultKind::Application,
            DispatchError::Encoding(_) => FaultKind::Encoding,
        }
    }

    pub fn to_protocol_error(&self) -> ProtocolError {
        match self {
            DispatchError::InvalidParams(reason) => {
                ProtocolError::invalid_params().with_data(reason.as_str())
            }
            DispatchError::Application(error) => error.clone(),
            DispatchError::Encoding(e) => ProtocolError::internal_error().with_data(e.to_string()),
        }
    }
}

/// Invoke `descriptor` for `request`, returning the encoded success result.
pub async fn dispatch(
    ctx: Context,
    request: Request,
    descriptor: &MethodDescriptor,
) -> Result<Box<RawValue>, DispatchError> {
    tracing::debug!(
        method = %request.method,
        params = ?descriptor.params(),
        "dispatching"
    );
    descriptor.invoke(ctx, request.params).await
}

/// Decode raw params into a fresh `P`.
pub(crate) fn bind_params<P>(
    params: Option<&RawValue>,
    policy: ZeroValuePolicy,
) -> Result<P, DispatchError>
where
    P: DeserializeOwned + Default + PartialEq,
{
    let raw = match params {
        Some(raw) if raw.get().trim() != "null" => raw,
        _ => return Err(DispatchError::InvalidParams("missing params".to_string())),
    };

    let value: P = serde_json::from_str(raw.get())
        .map_err(|e| DispatchError::InvalidParams(e.to_string()))?;

    if policy == ZeroValuePolicy::Reject && value == P::default() {
        return Err(DispatchError::InvalidParams(
            "params decode to an empty value".to_string(),
        ));
    }

    Ok(value)
}

/// Classify a handler's return value.
pub(crate) fn complete<R, E>(outcome: Result<R, E>) -> Result<Box<RawValue>, DispatchError>
where
    R: Serialize,
    E: Into<anyhow::Error>,
{
    match outcome {
        Ok(result) => serde_json::value::to_raw_value(&result).map_err(DispatchError::Encoding),
        Err(error) => Err(DispatchError::Application(into_protocol_error(error.into()))),
    }
}

/// Keep a structured [`ProtocolError`] as-is, wrap anything else under the
/// generic application code.
pub fn into_protocol_error(error: anyhow::Error) -> ProtocolError {
    match error.downcast::<ProtocolError>() {
        Ok(protocol_error) => protocol_error,
        Err(other) => ProtocolError::application(other.to_string()),
    }
}
