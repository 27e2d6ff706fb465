//! Chat fan-out service - Entry Point
//!
//! Starts the registry actor and the WebSocket listener, and tears both down
//! on Ctrl-C.

use std::env;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chat_fanout::{serve_until, ChatConfig, ChatService};

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_fanout=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_fanout=info")),
        )
        .init();

    // Bind address: first argument, then CHAT_BIND_ADDR, then the default
    let addr = env::args()
        .nth(1)
        .or_else(|| env::var("CHAT_BIND_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let config = ChatConfig::from_env()?;
    let service = ChatService::spawn(config)?;
    info!(config = ?service.config(), "Chat registry started");

    let listener = TcpListener::bind(&addr).await?;
    info!("Chat server listening on {}", addr);

    serve_until(listener, service.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    })
    .await?;

    service.shutdown().await;
    info!("Chat server stopped");
    Ok(())
}
