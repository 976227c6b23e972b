//! Response assembly: bytes in, bytes out.

use std::sync::Arc;

use rpcwire_core::codec;
use rpcwire_core::models::ServerConfig;
use rpcwire_core::{ProtocolError, RequestId, Response};

use crate::context::Context;
use crate::dispatch::{dispatch, ZeroValuePolicy};
use crate::error::FaultKind;
use crate::registry::{Handler, Registry, ShapeError};

/// Transport-independent JSON-RPC endpoint.
pub struct Server {
    registry: Arc<Registry>,
}

impl Server {
    pub fn new() -> Self {
        Self::with_policy(ZeroValuePolicy::default())
    }

    pub fn with_policy(policy: ZeroValuePolicy) -> Self {
        Self {
            registry: Arc::new(Registry::with_policy(policy)),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let policy = if config.reject_zero_params {
            ZeroValuePolicy::Reject
        } else {
            ZeroValuePolicy::Accept
        };
        Self::with_policy(policy)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn register<H, Args>(&self, method: &str, handler: H) -> Result<(), ShapeError>
    where
        H: Handler<Args>,
    {
        match self.registry.register(method, handler) {
            Ok(()) => {
                tracing::info!("Registered method {}", method);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Rejected handler for {}: {}", method, e);
                Err(e)
            }
        }
    }

    /// Process one encoded message. `None` means nothing is to be written back.
    pub async fn handle_message(&self, ctx: Context, bytes: &[u8]) -> Option<Vec<u8>> {
        let request = match codec::decode_request(bytes) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(kind = %FaultKind::from(&e), error = %e, "rejecting message");
                return Some(codec::encode_error(e.response_id(), e.to_protocol_error()));
            }
        };

        let id = request.id.clone();
        let Some(descriptor) = self.registry.resolve(&request.method) else {
            tracing::debug!(kind = %FaultKind::Routing, method = %request.method, "method not found");
            return Some(codec::encode_error(
                id.unwrap_or(RequestId::Null),
                ProtocolError::method_not_found(&request.method),
            ));
        };

        let method = request.method.clone();
        let outcome = dispatch(ctx, request, &descriptor).await;

        match outcome {
            Ok(result) => id.map(|id| codec::encode_response(&Response::success(result, id))),
            Err(e) if id.is_none() && e.kind().suppressed_for_notifications() => {
                tracing::warn!(kind = %e.kind(), method = %method, error = %e, "notification failed");
                None
            }
            Err(e) => {
                tracing::debug!(kind = %e.kind(), method = %method, error = %e, "call failed");
                Some(codec::encode_error(
                    id.unwrap_or(RequestId::Null),
                    e.to_protocol_error(),
                ))
            }
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcwire_core::codes;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Pair {
        a: i64,
        b: i64,
    }

    async fn add(_ctx: Context, pair: Pair) -> Result<i64, ProtocolError> {
        Ok(pair.a + pair.b)
    }

    async fn fail(_ctx: Context) -> Result<(), std::io::Error> {
        Err(std::io::Error::other("backend unavailable"))
    }

    async fn custom(_ctx: Context) -> Result<(), ProtocolError> {
        Err(ProtocolError::new(-32050, "quota exceeded").with_data(json!({"retry_after": 30})))
    }

    async fn handle(server: &Server, text: &str) -> Option<Value> {
        server
            .handle_message(Context::new(), text.as_bytes())
            .await
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }

    fn server() -> Server {
        let server = Server::new();
        server.register("math.add", add).unwrap();
        server.register("fail", fail).unwrap();
        server.register("custom", custom).unwrap();
        server
    }

    #[tokio::test]
    async fn test_success() {
        let resp = handle(&server(), r#"{"jsonrpc":"2.0","method":"math.add","params":{"a":2,"b":3},"id":1}"#)
            .await
            .unwrap();
        assert_eq!(resp, json!({"jsonrpc": "2.0", "result": 5, "id": 1}));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let resp = handle(&server(), "{oops").await.unwrap();
        assert_eq!(resp["error"]["code"], codes::PARSE_ERROR);
        assert_eq!(resp["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_id() {
        let resp = handle(&server(), r#"{"params":[],"id":"x"}"#).await.unwrap();
        assert_eq!(resp["error"]["code"], codes::INVALID_REQUEST);
        assert_eq!(resp["id"], "x");
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let resp = handle(&server(), r#"{"method":"nope","id":3}"#).await.unwrap();
        assert_eq!(resp["error"]["code"], codes::METHOD_NOT_FOUND);
        assert_eq!(resp["id"], 3);
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let server = server();
        for params in [r#""#, r#","params":null"#, r#","params":{"a":"x"}"#, r#","params":{}"#] {
            let text = format!(r#"{{"method":"math.add","id":4{}}}"#, params);
            let resp = handle(&server, &text).await.unwrap();
            assert_eq!(resp["error"]["code"], codes::INVALID_PARAMS, "{text}");
            assert_eq!(resp["id"], 4);
        }
    }

    #[tokio::test]
    async fn test_zero_values_accepted_when_configured() {
        let config = ServerConfig {
            reject_zero_params: false,
            ..ServerConfig::default()
        };
        let server = Server::from_config(&config);
        server.register("math.add", add).unwrap();

        let resp = handle(&server, r#"{"method":"math.add","params":{},"id":1}"#)
            .await
            .unwrap();
        assert_eq!(resp["result"], 0);
    }

    #[tokio::test]
    async fn test_application_errors() {
        let server = server();

        let resp = handle(&server, r#"{"method":"fail","id":1}"#).await.unwrap();
        assert_eq!(
            resp["error"],
            json!({"code": codes::APPLICATION_ERROR, "message": "backend unavailable"})
        );

        let resp = handle(&server, r#"{"method":"custom","id":2}"#).await.unwrap();
        assert_eq!(
            resp["error"],
            json!({"code": -32050, "message": "quota exceeded", "data": {"retry_after": 30}})
        );
    }

    #[tokio::test]
    async fn test_notifications() {
        let server = server();

        assert!(handle(&server, r#"{"method":"math.add","params":{"a":1,"b":1}}"#).await.is_none());
        assert!(handle(&server, r#"{"method":"math.add","params":{}}"#).await.is_none());
        assert!(handle(&server, r#"{"method":"fail"}"#).await.is_none());
        assert!(handle(&server, r#"{"method":"custom"}"#).await.is_none());

        let resp = handle(&server, r#"{"method":"unknown"}"#).await.unwrap();
        assert_eq!(resp["error"]["code"], codes::METHOD_NOT_FOUND);
        assert_eq!(resp["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_notification_still_runs_handler() {
        let server = Server::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        server
            .register("bump", move |_ctx: Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProtocolError>(()) }
            })
            .unwrap();

        assert!(handle(&server, r#"{"method":"bump"}"#).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_context_reaches_handler_unmodified() {
        let server = Server::new();
        server
            .register("cancelled", |ctx: Context| async move {
                Ok::<_, ProtocolError>(ctx.is_cancelled())
            })
            .unwrap();

        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let bytes = server
            .handle_message(
                Context::with_cancellation(token),
                br#"{"method":"cancelled","id":1}"#,
            )
            .await
            .unwrap();
        let resp: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(resp["result"], true);
    }
}
