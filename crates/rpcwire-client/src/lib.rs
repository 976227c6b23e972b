//! rpcwire Client Library
//!
//! Talks to an rpcwire daemon over its unix socket. Every call opens a fresh
//! connection, writes one line, and reads at most one line back.

use rpcwire_core::codec;
use rpcwire_core::{ProtocolError, Request, RequestId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// How long to wait for a reply unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(ProtocolError),

    #[error("Connection closed without a response")]
    Closed,

    #[error("Response id {got} does not match request id {expected}")]
    UnexpectedId { expected: RequestId, got: RequestId },

    #[error("No response within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// rpcwire daemon client
pub struct RpcClient {
    socket_path: String,
    request_counter: AtomicI64,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            request_counter: AtomicI64::new(1),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    fn next_id(&self) -> RequestId {
        RequestId::from(self.request_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Send a request and return its result.
    pub async fn call(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        let params = params
            .map(|params| serde_json::value::to_raw_value(&params))
            .transpose()?;
        let id = self.next_id();
        let request = Request::call(method, params, id.clone());

        let bytes = self
            .send_raw(&codec::encode_request(&request)?)
            .await?
            .ok_or(ClientError::Closed)?;
        let response = codec::decode_response(&bytes)?;

        // Errors raised before the id was known come back with a null id.
        let null_error = response.is_error() && response.id == RequestId::Null;
        if response.id != id && !null_error {
            return Err(ClientError::UnexpectedId {
                expected: id,
                got: response.id,
            });
        }

        let result = response.into_result().map_err(ClientError::Rpc)?;
        Ok(serde_json::from_str(result.get())?)
    }

    /// Typed variant of [`call`](Self::call).
    pub async fn call_typed<P, R>(&self, method: impl Into<String>, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let result = self.call(method, Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a notification. Returns the server's reply if it sent one anyway,
    /// which only happens for malformed or unroutable messages.
    pub async fn notify(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<Option<ProtocolError>> {
        let params = params
            .map(|params| serde_json::value::to_raw_value(&params))
            .transpose()?;
        let request = Request::notification(method, params);

        match self.send_raw(&codec::encode_request(&request)?).await? {
            Some(bytes) => {
                let response = codec::decode_response(&bytes)?;
                Ok(response.into_result().err())
            }
            None => Ok(None),
        }
    }

    /// Write `message` as one line and return the reply line, if any.
    ///
    /// The write side is shut down after sending, so the daemon finishes the
    /// message and closes the connection; `None` means it wrote nothing back.
    pub async fn send_raw(&self, message: &[u8]) -> Result<Option<Vec<u8>>> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();

        write_half.write_all(message).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;
        write_half.shutdown().await?;

        let mut reader = BufReader::new(read_half);
        let mut line = Vec::new();
        let read = tokio::time::timeout(self.timeout, reader.read_until(b'\n', &mut line))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        if read == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(Some(line))
    }
}
