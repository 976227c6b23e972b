use std::path::Path;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rpcwire_core::codec;
use rpcwire_core::{ProtocolError, RequestId};

use super::connection::{self, ConnectionError};
use crate::context::Context;
use crate::server::Server;

#[derive(Debug, thiserror::Error)]
pub enum IpcServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

pub type Result<T> = std::result::Result<T, IpcServerError>;

/// Serves a [`Server`] on a unix domain socket, one message per line.
pub struct IpcServer {
    socket_path: String,
    server: Arc<Server>,
    max_message_bytes: usize,
    shutdown: CancellationToken,
}

impl IpcServer {
    pub fn new(socket_path: String, server: Arc<Server>, max_message_bytes: usize) -> Self {
        Self {
            socket_path,
            server,
            max_message_bytes,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Bind the socket, replacing a stale one left by a previous run.
    pub fn bind(&self) -> Result<UnixListener> {
        let path = Path::new(&self.socket_path);
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        tracing::info!("IPC server listening on {}", self.socket_path);
        Ok(listener)
    }

    pub async fn start(self: Arc<Self>) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections until shutdown, then remove the socket file.
    pub async fn serve(self: Arc<Self>, listener: UnixListener) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let server = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await {
                                tracing::error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }

        drop(listener);
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!("IPC server stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        tracing::debug!("New client connected");

        let cancel = self.shutdown.child_token();
        let (mut reader, mut writer) = connection::split(stream, self.max_message_bytes);
        let (response_tx, mut response_rx) = mpsc::channel::<Vec<u8>>(100);

        let writer_cancel = cancel.clone();
        let writer_task = tokio::spawn(async move {
            while let Some(response) = response_rx.recv().await {
                if let Err(e) = writer.write_message(&response).await {
                    tracing::error!("Failed to write response: {}", e);
                    writer_cancel.cancel();
                    break;
                }
            }
        });

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                message = reader.next_message() => match message {
                    Ok(Some(bytes)) => {
                        let server = self.server.clone();
                        let ctx = Context::with_cancellation(cancel.clone());
                        let response_tx = response_tx.clone();
                        tokio::spawn(async move {
                            if let Some(response) = server.handle_message(ctx, &bytes).await {
                                if response_tx.send(response).await.is_err() {
                                    tracing::debug!("Dropping response for closed connection");
                                }
                            }
                        });
                    }
                    Ok(None) => {
                        tracing::debug!("Client disconnected");
                        break Ok(());
                    }
                    Err(ConnectionError::MessageTooLarge(limit)) => {
                        tracing::warn!("Rejecting message larger than {} bytes", limit);
                        let error = ProtocolError::invalid_request()
                            .with_data(format!("message exceeds {} bytes", limit));
                        if response_tx
                            .send(codec::encode_error(RequestId::Null, error))
                            .await
                            .is_err()
                        {
                            break Ok(());
                        }
                    }
                    Err(e) => break Err(e.into()),
                }
            }
        };

        // The client is gone; handlers still running see the cancellation, and
        // whatever they return is written before the writer ends.
        cancel.cancel();
        drop(response_tx);
        if let Err(e) = writer_task.await {
            tracing::error!("Response writer failed: {}", e);
        }

        outcome
    }
}
