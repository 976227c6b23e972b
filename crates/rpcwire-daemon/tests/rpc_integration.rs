use anyhow::Result;
use rpcwire_client::{ClientError, RpcClient};
use rpcwire_core::{codes, ProtocolError};
use rpcwire_daemon::builtin::{register_builtins, AddParams};
use rpcwire_daemon::{Context, IpcServer, Server};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _temp_dir: TempDir,
    ipc_server: Arc<IpcServer>,
    client: RpcClient,
    bumps: Arc<AtomicUsize>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.ipc_server.shutdown();
    }
}

async fn start(max_message_bytes: usize) -> Result<Harness> {
    let temp_dir = TempDir::new()?;
    let socket_path = temp_dir.path().join("rpcwire_test.sock");
    let socket_str = socket_path.to_string_lossy().to_string();

    let server = Server::new();
    register_builtins(&server)?;

    let bumps = Arc::new(AtomicUsize::new(0));
    let counter = bumps.clone();
    server.register("counter.bump", move |_ctx: Context| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, ProtocolError>(()) }
    })?;

    let ipc_server = Arc::new(IpcServer::new(
        socket_str.clone(),
        Arc::new(server),
        max_message_bytes,
    ));
    let listener = ipc_server.bind()?;
    tokio::spawn(ipc_server.clone().serve(listener));

    Ok(Harness {
        _temp_dir: temp_dir,
        ipc_server,
        client: RpcClient::new(socket_str),
        bumps,
    })
}

fn rpc_code(err: ClientError) -> i32 {
    match err {
        ClientError::Rpc(error) => error.code,
        other => panic!("expected an RPC error, got {other}"),
    }
}

#[tokio::test]
async fn test_builtin_methods() -> Result<()> {
    let harness = start(1024 * 1024).await?;
    let client = &harness.client;

    assert_eq!(client.call("system.ping", None).await?, json!("pong"));
    assert_eq!(client.call("echo", Some(json!("hello"))).await?, json!("hello"));

    let sum: i64 = client
        .call_typed("math.add", &AddParams { a: 20, b: 22 })
        .await?;
    assert_eq!(sum, 42);

    let methods = client.call("system.methods", None).await?;
    assert_eq!(
        methods,
        json!([
            "counter.bump",
            "echo",
            "math.add",
            "system.describe",
            "system.methods",
            "system.ping"
        ])
    );

    let described = client.call("system.describe", None).await?;
    assert_eq!(described.as_array().map(Vec::len), Some(6));

    Ok(())
}

#[tokio::test]
async fn test_error_responses() -> Result<()> {
    let harness = start(1024 * 1024).await?;
    let client = &harness.client;

    let err = client.call("missing.method", None).await.unwrap_err();
    assert_eq!(rpc_code(err), codes::METHOD_NOT_FOUND);

    let err = client.call("math.add", Some(json!({"a": "one"}))).await.unwrap_err();
    assert_eq!(rpc_code(err), codes::INVALID_PARAMS);

    let err = client.call("math.add", Some(json!({}))).await.unwrap_err();
    assert_eq!(rpc_code(err), codes::INVALID_PARAMS);

    let err = client
        .call("math.add", Some(json!({"a": i64::MAX, "b": 1})))
        .await
        .unwrap_err();
    assert_eq!(rpc_code(err), codes::APPLICATION_ERROR);

    Ok(())
}

#[tokio::test]
async fn test_raw_messages() -> Result<()> {
    let harness = start(1024 * 1024).await?;
    let client = &harness.client;

    let reply = client.send_raw(b"this is not json").await?.unwrap();
    let reply: Value = serde_json::from_slice(&reply)?;
    assert_eq!(reply["error"]["code"], codes::PARSE_ERROR);
    assert_eq!(reply["id"], Value::Null);

    let reply = client.send_raw(br#"{"jsonrpc":"2.0","id":"abc"}"#).await?.unwrap();
    let reply: Value = serde_json::from_slice(&reply)?;
    assert_eq!(reply["error"]["code"], codes::INVALID_REQUEST);
    assert_eq!(reply["id"], "abc");

    let reply = client
        .send_raw(br#"{"jsonrpc":"2.0","method":"system.ping","id":null}"#)
        .await?
        .unwrap();
    let reply: Value = serde_json::from_slice(&reply)?;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": "pong", "id": null}));

    Ok(())
}

#[tokio::test]
async fn test_notifications() -> Result<()> {
    let harness = start(1024 * 1024).await?;
    let client = &harness.client;

    assert!(client.notify("counter.bump", None).await?.is_none());
    assert_eq!(harness.bumps.load(Ordering::SeqCst), 1);

    // failures of a routed notification stay off the wire
    assert!(client.notify("math.add", Some(json!({"a": "x"}))).await?.is_none());
    assert!(client.notify("echo", Some(json!(""))).await?.is_none());

    let error = client.notify("missing.method", None).await?.unwrap();
    assert_eq!(error.code, codes::METHOD_NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_oversized_message() -> Result<()> {
    let harness = start(128).await?;
    let client = &harness.client;

    let err = client
        .call("echo", Some(json!("x".repeat(256))))
        .await
        .unwrap_err();
    assert_eq!(rpc_code(err), codes::INVALID_REQUEST);

    assert_eq!(client.call("system.ping", None).await?, json!("pong"));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_clients() -> Result<()> {
    let harness = start(1024 * 1024).await?;
    let client = Arc::new(RpcClient::new(harness.client.socket_path()));

    let mut handles = Vec::new();
    for i in 1..=32i64 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .call_typed::<_, i64>("math.add", &AddParams { a: i, b: i })
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let expected = 2 * (i as i64 + 1);
        assert_eq!(handle.await??, expected);
    }

    Ok(())
}
