//! JSON-RPC envelope types

use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
pub mod codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method is not registered.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Generic error returned by application code.
    pub const APPLICATION_ERROR: i32 = -32000;
}

/// Request ID (can be string, number, or null)
///
/// Numbers keep their literal text, so an id is echoed back exactly as it
/// arrived even when it does not fit an `i64`, `u64` or `f64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestId {
    Number(String),
    String(String),
    Null,
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id.to_string())
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RequestId::Number(text) => RawValue::from_string(text.clone())
                .map_err(ser::Error::custom)?
                .serialize(serializer),
            RequestId::String(id) => serializer.serialize_str(id),
            RequestId::Null => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let text = raw.get();
        match text.as_bytes().first() {
            Some(b'"') => serde_json::from_str(text)
                .map(RequestId::String)
                .map_err(de::Error::custom),
            Some(b'n') => Ok(RequestId::Null),
            Some(b'-' | b'0'..=b'9') => Ok(RequestId::Number(text.to_string())),
            _ => Err(de::Error::custom("id must be a string, number or null")),
        }
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{:?}", s),
            RequestId::Null => f.write_str("null"),
        }
    }
}

/// A decoded call or notification.
///
/// `id` is `None` only when the member was absent from the wire message; a
/// present `null` id decodes to `Some(RequestId::Null)` and is still a call.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Option<Box<RawValue>>,
}

impl Request {
    pub fn call(method: impl Into<String>, params: Option<Box<RawValue>>, id: RequestId) -> Self {
        Self {
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Box<RawValue>>) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 2 + usize::from(self.params.is_some()) + usize::from(self.id.is_some());
        let mut state = serializer.serialize_struct("Request", len)?;
        state.serialize_field("jsonrpc", JSONRPC_VERSION)?;
        state.serialize_field("method", &self.method)?;
        match &self.params {
            Some(params) => state.serialize_field("params", params)?,
            None => state.skip_field("params")?,
        }
        match &self.id {
            Some(id) => state.serialize_field("id", id)?,
            None => state.skip_field("id")?,
        }
        state.end()
    }
}

/// Either the success result or the error of a response, never both.
#[derive(Debug, Clone)]
pub enum Payload {
    Result(Box<RawValue>),
    Error(ProtocolError),
}

#[derive(Debug, Clone)]
pub struct Response {
    pub id: RequestId,
    pub payload: Payload,
}

impl Response {
    pub fn success(result: Box<RawValue>, id: RequestId) -> Self {
        Self {
            id,
            payload: Payload::Result(result),
        }
    }

    pub fn error(error: ProtocolError, id: RequestId) -> Self {
        Self {
            id,
            payload: Payload::Error(error),
        }
    }

    pub fn result(&self) -> Option<&RawValue> {
        match &self.payload {
            Payload::Result(raw) => Some(raw),
            Payload::Error(_) => None,
        }
    }

    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match &self.payload {
            Payload::Result(_) => None,
            Payload::Error(error) => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, Payload::Error(_))
    }

    /// Consume the response, turning an error payload into `Err`.
    pub fn into_result(self) -> Result<Box<RawValue>, ProtocolError> {
        match self.payload {
            Payload::Result(raw) => Ok(raw),
            Payload::Error(error) => Err(error),
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Response", 3)?;
        state.serialize_field("jsonrpc", JSONRPC_VERSION)?;
        match &self.payload {
            Payload::Result(result) => state.serialize_field("result", result)?,
            Payload::Error(error) => state.serialize_field("error", error)?,
        }
        state.serialize_field("id", &self.id)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    #[serde(default, deserialize_with = "deserialize_present")]
    result: Option<Box<RawValue>>,
    #[serde(default)]
    error: Option<ProtocolError>,
    #[serde(default, deserialize_with = "deserialize_present")]
    id: Option<RequestId>,
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = ResponseEnvelope::deserialize(deserializer)?;
        let id = envelope.id.ok_or_else(|| de::Error::missing_field("id"))?;
        let payload = match (envelope.result, envelope.error) {
            (Some(result), None) => Payload::Result(result),
            (None, Some(error)) => Payload::Error(error),
            (Some(_), Some(_)) => {
                return Err(de::Error::custom(
                    "response carries both result and error",
                ))
            }
            (None, None) => {
                return Err(de::Error::custom(
                    "response carries neither result nor error",
                ))
            }
        };
        Ok(Self { id, payload })
    }
}

/// Deserialize a member that is present on the wire, keeping `null` as a value.
///
/// Paired with `#[serde(default)]` this tells an absent member (`None`) apart
/// from one explicitly set to `null` (`Some(..)`).
pub(crate) fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct ProtocolError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProtocolError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn parse_error() -> Self {
        Self::new(codes::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(codes::INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, "Method not found").with_data(method)
    }

    pub fn invalid_params() -> Self {
        Self::new(codes::INVALID_PARAMS, "Invalid params")
    }

    pub fn internal_error() -> Self {
        Self::new(codes::INTERNAL_ERROR, "Internal error")
    }

    /// Wrap an arbitrary application failure under the generic server error code.
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(codes::APPLICATION_ERROR, message)
    }
}
