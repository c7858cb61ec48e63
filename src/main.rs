//! Interest-matched 1:1 WebSocket Chat Server - Entry Point
//!
//! Starts the TCP listener and ChatServer actor, accepting connections.

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pairchat::{handle_connection, ChatServer, ServerCommand, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();

    // RUST_LOG wins over --log-level, e.g. RUST_LOG=pairchat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Pairchat server listening on {}", addr);

    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let server = ChatServer::new(cmd_rx);
    tokio::spawn(server.run());

    info!("ChatServer actor started");

    if let Some(period) = config.stats_period() {
        tokio::spawn(log_stats(cmd_tx.clone(), period));
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let cmd_tx = cmd_tx.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, cmd_tx).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

/// Periodically log registry and lobby counters
async fn log_stats(cmd_tx: mpsc::Sender<ServerCommand>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let (reply, rx) = oneshot::channel();
        if cmd_tx.send(ServerCommand::Stats { reply }).await.is_err() {
            break;
        }
        let Ok(stats) = rx.await else {
            break;
        };
        info!(
            "Stats: clients={} waiting={} rooms={}",
            stats.clients, stats.waiting, stats.rooms
        );
    }
}
