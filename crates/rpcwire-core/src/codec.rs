//! Envelope codec: raw bytes to [`Request`] and [`Response`] to raw bytes.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::protocol::{
    deserialize_present, ProtocolError, Request, RequestId, Response, JSONRPC_VERSION,
};

/// Written when a response cannot be serialized at all.
pub const FALLBACK_INTERNAL_ERROR: &[u8] =
    br#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"},"id":null}"#;

/// Why an incoming message could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not UTF-8, so not JSON text; the id is unrecoverable.
    #[error("message is not UTF-8: {0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    /// Not syntactically valid JSON; the id is unrecoverable.
    #[error("malformed JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),

    /// Valid JSON that is not a well-formed request envelope.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// The id, if it could be recovered. `None` means the member was
        /// absent or undecodable.
        id: Option<RequestId>,
        reason: String,
    },
}

impl DecodeError {
    fn invalid(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        DecodeError::InvalidMessage {
            id,
            reason: reason.into(),
        }
    }

    /// Id to put on the error response.
    pub fn response_id(&self) -> RequestId {
        match self {
            DecodeError::InvalidUtf8(_) | DecodeError::MalformedJson(_) => RequestId::Null,
            DecodeError::InvalidMessage { id, .. } => id.clone().unwrap_or(RequestId::Null),
        }
    }

    /// The protocol error this decode failure is reported as.
    pub fn to_protocol_error(&self) -> ProtocolError {
        match self {
            DecodeError::InvalidUtf8(e) => ProtocolError::parse_error().with_data(e.to_string()),
            DecodeError::MalformedJson(e) => ProtocolError::parse_error().with_data(e.to_string()),
            DecodeError::InvalidMessage { reason, .. } => {
                ProtocolError::invalid_request().with_data(reason.as_str())
            }
        }
    }
}

/// Every member is kept raw so that shape problems are reported per member
/// instead of as one opaque serde error.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default, deserialize_with = "deserialize_present")]
    jsonrpc: Option<Box<RawValue>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    id: Option<Box<RawValue>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    method: Option<Box<RawValue>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    params: Option<Box<RawValue>>,
}

/// Decode one request envelope.
pub fn decode_request(bytes: &[u8]) -> Result<Request, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(DecodeError::InvalidUtf8)?;
    serde_json::from_str::<IgnoredAny>(text).map_err(DecodeError::MalformedJson)?;

    // Structs also deserialize from arrays; only an object is an envelope.
    if !text.trim_start().starts_with('{') {
        return Err(DecodeError::invalid(None, "not a request object"));
    }

    let envelope: RawEnvelope = serde_json::from_str(text)
        .map_err(|e| DecodeError::invalid(None, format!("not a request object: {}", e)))?;

    let id = match envelope.id {
        None => None,
        Some(raw) => Some(
            serde_json::from_str::<RequestId>(raw.get())
                .map_err(|_| DecodeError::invalid(None, "id must be a string, number or null"))?,
        ),
    };

    if let Some(raw) = envelope.jsonrpc {
        match serde_json::from_str::<String>(raw.get()) {
            Ok(version) if version == JSONRPC_VERSION => {}
            _ => {
                return Err(DecodeError::invalid(
                    id,
                    format!("jsonrpc must be \"{}\"", JSONRPC_VERSION),
                ))
            }
        }
    }

    let method = match envelope.method {
        None => return Err(DecodeError::invalid(id, "missing method")),
        Some(raw) => match serde_json::from_str::<String>(raw.get()) {
            Ok(method) => method,
            Err(_) => return Err(DecodeError::invalid(id, "method must be a string")),
        },
    };

    Ok(Request {
        id,
        method,
        params: envelope.params,
    })
}

/// Decode a response envelope, as a client would.
pub fn decode_response(bytes: &[u8]) -> serde_json::Result<Response> {
    serde_json::from_slice(bytes)
}

pub fn encode_request(request: &Request) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(request)
}

/// Encode a response. Falls back to a fixed internal error document if the
/// response itself cannot be serialized.
pub fn encode_response(response: &Response) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|_| FALLBACK_INTERNAL_ERROR.to_vec())
}

/// Encode a success response, reporting an unserializable result as an
/// internal error instead of failing.
pub fn encode_success<T: Serialize + ?Sized>(id: RequestId, result: &T) -> Vec<u8> {
    match serde_json::value::to_raw_value(result) {
        Ok(raw) => encode_response(&Response::success(raw, id)),
        Err(e) => encode_error(id, ProtocolError::internal_error().with_data(e.to_string())),
    }
}

pub fn encode_error(id: RequestId, error: ProtocolError) -> Vec<u8> {
    encode_response(&Response::error(error, id))
}
