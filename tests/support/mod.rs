// Local WebSocket server and helpers shared by the connection tests.
#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use geostrike_sync::network::ConnectionConfig;
use geostrike_sync::{SyncConfig, SyncEvent};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub type ServerSocket = WebSocketStream<TcpStream>;

// Upper bound on any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

pub const TOKEN: &str = "test-token";

// Server that accepts every connection and hands the socket to the test.
pub struct FakeServer {
    pub url: String,
    accepted: mpsc::UnboundedReceiver<ServerSocket>,
    task: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral test port");
        let url = format!("ws://{}", listener.local_addr().expect("get local addr"));
        let (tx, accepted) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                // The client rejects a handshake that drops its sub-protocol.
                let echo = |request: &Request, mut response: Response| {
                    if let Some(protocol) = request.headers().get(SEC_WEBSOCKET_PROTOCOL) {
                        response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol.clone());
                    }
                    Ok::<_, ErrorResponse>(response)
                };
                match tokio_tungstenite::accept_hdr_async(stream, echo).await {
                    Ok(ws) => {
                        if tx.send(ws).is_err() {
                            return;
                        }
                    }
                    Err(e) => eprintln!("test server handshake failed: {}", e),
                }
            }
        });

        Self { url, accepted, task }
    }

    // Next accepted connection.
    pub async fn accept(&mut self) -> ServerSocket {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("client should connect in time")
            .expect("server task alive")
    }

    // Next accepted connection, or `None` if none arrives within `wait`.
    pub async fn try_accept(&mut self, wait: Duration) -> Option<ServerSocket> {
        tokio::time::timeout(wait, self.accepted.recv()).await.ok().flatten()
    }

    // Stop listening; later connection attempts are refused.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

pub fn config(url: &str) -> SyncConfig {
    SyncConfig {
        connection: ConnectionConfig {
            endpoint: url.to_string(),
            auth_token: TOKEN.to_string(),
            connect_timeout: Duration::from_secs(2),
            backoff_base: Duration::from_millis(10),
            max_reconnect_attempts: 3,
            ..Default::default()
        },
        ..Default::default()
    }
}

// A port with nothing listening on it.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("ws://127.0.0.1:{}", port)
}

pub async fn send_msgpack(ws: &mut ServerSocket, value: &Value) {
    let bytes = rmp_serde::to_vec_named(value).expect("encode msgpack");
    ws.send(Message::Binary(bytes)).await.expect("server send");
}

pub async fn send_text(ws: &mut ServerSocket, value: &Value) {
    ws.send(Message::Text(value.to_string())).await.expect("server send");
}

// Next client command envelope, decoded from MessagePack.
pub async fn next_command(ws: &mut ServerSocket) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("client should send in time")
            .expect("stream open")
            .expect("read frame");
        match message {
            Message::Binary(bytes) => {
                return rmp_serde::from_slice(&bytes).expect("client frames are msgpack")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected client frame: {:?}", other),
        }
    }
}

// Wait until the client side of `ws` goes away.
pub async fn wait_closed(ws: &mut ServerSocket) {
    tokio::time::timeout(WAIT, async {
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                return;
            }
        }
    })
    .await
    .expect("client should close in time")
}

// Wait for the first event matching `pred`.
pub async fn wait_for(
    sub: &mut geostrike_sync::sync::Subscription,
    mut pred: impl FnMut(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = sub.recv().await.expect("bus open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event should arrive in time")
}
