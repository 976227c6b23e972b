//! rpcwire daemon
//!
//! Serves the built-in JSON-RPC methods on a unix domain socket.

use anyhow::Result;
use clap::Parser;
use rpcwire_core::models::ServerConfig;
use rpcwire_core::storage::{init_config_dir, init_data_dir, ConfigStorage};
use rpcwire_daemon::builtin::register_builtins;
use rpcwire_daemon::{IpcServer, Server};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "rpcwired")]
#[command(about = "rpcwire daemon - JSON-RPC 2.0 over a unix socket", long_about = None)]
struct Args {
    /// Socket path for IPC (overrides the config file)
    #[arg(short, long)]
    socket: Option<String>,

    /// Log level (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigStorage::load_file(path)?,
        None => ConfigStorage::new(init_config_dir()?).load()?,
    };

    if let Some(socket) = &args.socket {
        config.socket_path = socket.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
    config.validate()?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let data_dir = init_data_dir()?;
    let log_file_path = data_dir.join("rpcwired.log");
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    // stdout gets INFO and above, the log file everything down to DEBUG
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    let stdout_writer = std::io::stdout.with_max_level(tracing::Level::INFO);
    let file_writer = log_file.with_max_level(tracing::Level::DEBUG);

    tracing_subscriber::fmt()
        .with_writer(stdout_writer.and(file_writer))
        .with_env_filter(config.log_level.as_str())
        .with_ansi(false)
        .init();

    tracing::info!("rpcwire daemon starting...");
    tracing::info!("Socket path: {}", config.socket_path);
    tracing::info!("Log file: {}", log_file_path.display());
    if !config.reject_zero_params {
        tracing::info!("Zero-valued parameters are accepted");
    }

    let server = Server::from_config(&config);
    register_builtins(&server)?;
    tracing::info!("{} methods registered", server.registry().len());

    let ipc_server = Arc::new(IpcServer::new(
        config.socket_path.clone(),
        Arc::new(server),
        config.max_message_bytes,
    ));

    let server_handle = {
        let server = ipc_server.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                tracing::error!("IPC server error: {}", e);
            }
        })
    };

    tracing::info!("Daemon ready and listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    ipc_server.shutdown();
    server_handle.await?;

    Ok(())
}
