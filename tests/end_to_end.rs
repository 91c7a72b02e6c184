//! End-to-end signaling scenario over real WebSockets
//!
//! Drives a broadcaster and two viewers against a live server: publish,
//! discovery, joins, the full offer/answer/candidate exchange, chat, an
//! abrupt viewer disconnect, and the final unpublish.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use signal_rs::{ServerConfig, SignalingServer};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = SignalingServer::new(ServerConfig::default());
    tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

async fn send(client: &mut Client, message: Value) {
    client
        .send(Message::Text(message.to_string()))
        .await
        .unwrap();
}

/// Receive messages until one with the given type tag arrives
async fn wait_for(client: &mut Client, message_type: &str) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for message")
            .expect("connection closed")
            .unwrap();

        if let Message::Text(text) = frame {
            let message: Value = serde_json::from_str(&text).unwrap();
            if message["type"] == message_type {
                return message;
            }
        }
    }
}

async fn http_get_json(addr: SocketAddr, path: &str) -> Value {
    let client = hyper::Client::new();
    let uri: hyper::Uri = format!("http://{}{}", addr, path).parse().unwrap();

    let response = client.get(uri).await.unwrap();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();

    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_full_broadcast_scenario() {
    let addr = start_server().await;

    let mut broadcaster = connect(addr).await;
    let hello = wait_for(&mut broadcaster, "connected").await;
    let broadcaster_id = hello["connectionId"].as_u64().unwrap();

    let mut v1 = connect(addr).await;
    wait_for(&mut v1, "connected").await;
    let mut v2 = connect(addr).await;
    wait_for(&mut v2, "connected").await;

    // Broadcaster publishes and gets an ack with a fresh id
    send(
        &mut broadcaster,
        json!({ "type": "start-stream", "title": "Demo", "streamer": "Alice" }),
    )
    .await;
    let started = wait_for(&mut broadcaster, "stream-started").await;
    let stream_id = started["streamId"].as_str().unwrap().to_owned();
    assert!(stream_id.starts_with("stream_"));

    // Every connection sees the announcement
    let announced = wait_for(&mut v1, "new-stream").await;
    assert_eq!(announced["stream"]["title"], "Demo");
    assert_eq!(announced["stream"]["streamer"], "Alice");
    wait_for(&mut v2, "new-stream").await;

    // Discovery over HTTP
    let listed = http_get_json(addr, "/api/streams").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], json!(stream_id));
    assert_eq!(listed[0]["viewers"], 0);

    // First viewer joins
    send(&mut v1, json!({ "type": "join-stream", "streamId": stream_id })).await;
    assert_eq!(wait_for(&mut v1, "viewer-count").await["count"], 1);

    // Second viewer joins; both see the new count
    send(&mut v2, json!({ "type": "join-stream", "streamId": stream_id })).await;
    assert_eq!(wait_for(&mut v2, "viewer-count").await["count"], 2);
    assert_eq!(wait_for(&mut v1, "viewer-count").await["count"], 2);

    // Viewer offers; the broadcaster receives it tagged with the viewer's id
    send(
        &mut v1,
        json!({
            "type": "offer",
            "streamId": stream_id,
            "offer": { "type": "offer", "sdp": "v=0" },
        }),
    )
    .await;
    let offer = wait_for(&mut broadcaster, "offer").await;
    assert_eq!(offer["streamId"], json!(stream_id));
    assert_eq!(offer["offer"]["sdp"], "v=0");
    let v1_id = offer["viewerId"].as_u64().unwrap();

    // Broadcaster answers that viewer
    send(
        &mut broadcaster,
        json!({
            "type": "answer",
            "viewerId": v1_id,
            "answer": { "type": "answer", "sdp": "v=0" },
        }),
    )
    .await;
    let answer = wait_for(&mut v1, "answer").await;
    assert_eq!(answer["broadcasterId"], json!(broadcaster_id));

    // Candidates both ways: implicit route viewer -> broadcaster, explicit
    // target broadcaster -> viewer
    send(
        &mut v1,
        json!({
            "type": "ice-candidate",
            "streamId": stream_id,
            "candidate": { "candidate": "candidate:0" },
        }),
    )
    .await;
    assert_eq!(
        wait_for(&mut broadcaster, "ice-candidate").await["senderId"],
        json!(v1_id)
    );

    send(
        &mut broadcaster,
        json!({
            "type": "ice-candidate",
            "targetId": v1_id,
            "candidate": { "candidate": "candidate:1" },
        }),
    )
    .await;
    assert_eq!(
        wait_for(&mut v1, "ice-candidate").await["senderId"],
        json!(broadcaster_id)
    );

    // Chat fans out to the room with a server-stamped timestamp
    send(
        &mut v1,
        json!({
            "type": "chat-message",
            "streamId": stream_id,
            "message": "hi",
            "username": "viewer one",
        }),
    )
    .await;
    let chat = wait_for(&mut v2, "chat-message").await;
    assert_eq!(chat["message"], "hi");
    assert_eq!(chat["username"], "viewer one");
    assert!(chat["timestamp"].as_str().unwrap().ends_with('Z'));

    // First viewer drops without leaving; the room sees the new count
    drop(v1);
    assert_eq!(wait_for(&mut v2, "viewer-count").await["count"], 1);

    // Broadcaster unpublishes; the room is told the stream ended and the
    // stream disappears everywhere
    send(
        &mut broadcaster,
        json!({ "type": "stop-stream", "streamId": stream_id }),
    )
    .await;
    wait_for(&mut v2, "stream-ended").await;
    assert_eq!(
        wait_for(&mut v2, "stream-removed").await["streamId"],
        json!(stream_id)
    );

    let listed = http_get_json(addr, "/api/streams").await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_broadcaster_disconnect_ends_stream() {
    let addr = start_server().await;

    let mut broadcaster = connect(addr).await;
    wait_for(&mut broadcaster, "connected").await;
    let mut viewer = connect(addr).await;
    wait_for(&mut viewer, "connected").await;

    send(
        &mut broadcaster,
        json!({ "type": "start-stream", "title": "Demo", "streamer": "Alice" }),
    )
    .await;
    let started = wait_for(&mut broadcaster, "stream-started").await;
    let stream_id = started["streamId"].as_str().unwrap().to_owned();

    send(
        &mut viewer,
        json!({ "type": "join-stream", "streamId": stream_id }),
    )
    .await;
    wait_for(&mut viewer, "viewer-count").await;

    // Abrupt disconnect, no stop-stream
    drop(broadcaster);

    wait_for(&mut viewer, "stream-ended").await;
    wait_for(&mut viewer, "stream-removed").await;

    let listed = http_get_json(addr, "/api/streams").await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start_server().await;

    let health = http_get_json(addr, "/health").await;

    assert_eq!(health["status"], "ok");
    assert!(health["timestamp"].is_string());
    assert_eq!(health["streams"], 0);
}
