//! WebSocket connection pump
//!
//! One task per connection reads inbound frames and dispatches them to the
//! registry and relay; a writer task drains the connection's hub channel
//! into the socket. Teardown runs the disconnect sweep unconditionally,
//! whatever the cause of the close.

use futures_util::{SinkExt, StreamExt};
use hyper_tungstenite::tungstenite::Message;
use hyper_tungstenite::HyperWebsocket;

use crate::error::Result;
use crate::hub::ConnectionId;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::PublishRequest;
use crate::server::http::RequestContext;

/// Serve one upgraded WebSocket until it closes
pub(crate) async fn serve(websocket: HyperWebsocket, ctx: RequestContext) -> Result<()> {
    let ws = websocket.await?;
    let (mut sink, mut stream) = ws.split();

    let (conn_id, mut outbound) = ctx.hub.register().await;
    ctx.stats.connection_opened();

    tracing::info!(connection_id = %conn_id, "Client connected");

    ctx.hub
        .send_to(
            conn_id,
            ServerMessage::Connected {
                connection_id: conn_id,
            },
        )
        .await;

    // Writer: hub channel -> socket. Exits when the channel closes at
    // unregister, or when the peer stops accepting frames.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode outbound message");
                    continue;
                }
            };

            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }

        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch(&ctx, conn_id, &text).await,
            Ok(Message::Close(_)) => break,
            // Pings are answered by the protocol layer; binary frames are
            // not part of the signaling protocol
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %conn_id, error = %e, "Read error");
                break;
            }
        }
    }

    // Stop delivery first so the sweep's notifications skip this
    // connection, then sweep it out of every room it was in.
    ctx.hub.unregister(conn_id).await;
    ctx.registry.drop_connection(conn_id).await;
    ctx.stats.connection_closed();
    let _ = writer.await;

    tracing::info!(connection_id = %conn_id, "Client disconnected");

    Ok(())
}

/// Dispatch one inbound message
///
/// Registry and relay failures are benign races by design; they are logged
/// and the message is dropped. Nothing here propagates an error to the
/// connection.
async fn dispatch(ctx: &RequestContext, conn_id: ConnectionId, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(
                connection_id = %conn_id,
                error = %e,
                "Ignoring malformed message"
            );
            return;
        }
    };

    match message {
        ClientMessage::StartStream {
            stream_id,
            title,
            streamer,
        } => {
            let request = PublishRequest {
                stream_id,
                title,
                broadcaster_name: streamer,
            };
            if let Err(e) = ctx.registry.publish(request, conn_id).await {
                tracing::warn!(connection_id = %conn_id, error = %e, "Publish rejected");
            }
        }

        ClientMessage::StopStream { stream_id } => {
            if let Err(e) = ctx.registry.unpublish(&stream_id, conn_id).await {
                tracing::debug!(connection_id = %conn_id, error = %e, "Unpublish dropped");
            }
        }

        ClientMessage::JoinStream { stream_id } => {
            if let Err(e) = ctx.registry.join(&stream_id, conn_id).await {
                tracing::debug!(connection_id = %conn_id, error = %e, "Join dropped");
            }
        }

        ClientMessage::LeaveStream { stream_id } => {
            if let Err(e) = ctx.registry.leave(&stream_id, conn_id).await {
                tracing::debug!(connection_id = %conn_id, error = %e, "Leave dropped");
            }
        }

        ClientMessage::Offer { stream_id, offer } => {
            // Routing failures already logged by the relay
            let _ = ctx.relay.route_offer(&stream_id, conn_id, offer).await;
        }

        ClientMessage::Answer { viewer_id, answer } => {
            ctx.relay.route_answer(viewer_id, conn_id, answer).await;
        }

        ClientMessage::IceCandidate {
            candidate,
            target_id,
            stream_id,
        } => {
            let _ = ctx
                .relay
                .route_candidate(conn_id, candidate, target_id, stream_id.as_ref())
                .await;
        }

        ClientMessage::ChatMessage {
            stream_id,
            message,
            username,
        } => {
            let _ = ctx.relay.broadcast_chat(&stream_id, message, username).await;
        }
    }
}
