//! WebSocket connection handler
//!
//! Thin transport adapter: every text frame is parsed into a
//! `ClientMessage`, mapped onto one `ChatService` operation, and the result is
//! written back as a `ServerMessage`. Requests run in their own tasks so a
//! long-poll `receive` never blocks other requests on the same connection;
//! the tasks are aborted when the connection goes away. At most
//! [`MAX_PENDING_REQUESTS`] run at once per connection; requests beyond that
//! are answered with `ERR_TOO_MANY_REQUESTS`.

use std::future::Future;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, ErrorCode};
use crate::message::{ClientMessage, ServerMessage};
use crate::service::ChatService;
use crate::types::ConnectionId;

/// Outbound frame buffer per connection
const OUTBOUND_BUFFER_SIZE: usize = 32;

/// Requests allowed in flight per connection
pub const MAX_PENDING_REQUESTS: usize = 16;

/// Accept connections until `shutdown` resolves
pub async fn serve_until<F>(
    listener: TcpListener,
    service: ChatService,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Listener shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let service = service.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, service).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    Ok(())
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake and serves requests until either side
/// closes. Pending requests of this connection are cancelled on exit.
pub async fn handle_connection(stream: TcpStream, service: ChatService) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = ConnectionId::new();
    info!("Connection {} opened from {}", connection_id, peer_addr);

    let connected = ServerMessage::Connected {
        connection_id: connection_id.to_string(),
    };
    ws_sender
        .send(Message::Text(serde_json::to_string(&connected)?.into()))
        .await?;

    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER_SIZE);

    // Write task (ServerMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    // Read loop (WebSocket -> ChatService), one task per request
    let mut requests = JoinSet::new();
    let in_flight = Arc::new(Semaphore::new(MAX_PENDING_REQUESTS));
    loop {
        tokio::select! {
            frame = ws_receiver.next() => {
                let Some(frame) = frame else { break };
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(request) => match in_flight.clone().try_acquire_owned() {
                            Ok(permit) => {
                                let service = service.clone();
                                let msg_tx = msg_tx.clone();
                                requests.spawn(async move {
                                    let reply = dispatch(&service, request).await;
                                    let _ = msg_tx.send(reply).await;
                                    drop(permit);
                                });
                            }
                            Err(_) => {
                                warn!("Connection {} has too many pending requests", connection_id);
                                let _ = msg_tx
                                    .send(ServerMessage::Error {
                                        code: ErrorCode::TooManyRequests,
                                        message: format!(
                                            "At most {} requests may be pending",
                                            MAX_PENDING_REQUESTS
                                        ),
                                    })
                                    .await;
                            }
                        },
                        Err(e) => {
                            warn!("Invalid JSON from {}: {}", connection_id, e);
                            let _ = msg_tx
                                .send(ServerMessage::Error {
                                    code: ErrorCode::InvalidRequest,
                                    message: format!("Invalid message format: {}", e),
                                })
                                .await;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        debug!("Connection {} sent close frame", connection_id);
                        break;
                    }
                    Ok(_) => {
                        // Binary, ping and pong frames carry no requests
                    }
                    Err(e) => {
                        error!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
            Some(_) = requests.join_next() => {}
            _ = &mut write_task => {
                debug!("Write task completed for {}", connection_id);
                break;
            }
        }
    }

    // cancels any receive still waiting for this connection
    requests.shutdown().await;
    drop(msg_tx);
    if !write_task.is_finished() {
        let _ = write_task.await;
    }

    info!("Connection {} closed", connection_id);
    Ok(())
}

/// Run one request against the service
async fn dispatch(service: &ChatService, request: ClientMessage) -> ServerMessage {
    let result = match request {
        ClientMessage::Join(req) => service.join(req).await.map(ServerMessage::Joined),
        ClientMessage::Send(req) => service.send_message(req).await.map(ServerMessage::Sent),
        ClientMessage::Leave(req) => service.leave(req).await.map(ServerMessage::Left),
        ClientMessage::Receive(req) => service.get_message(req).await.map(ServerMessage::Message),
    };
    result.unwrap_or_else(ServerMessage::from)
}
