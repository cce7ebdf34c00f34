//! End-to-end tests against a loopback WebSocket server.
//!
//! The server greets each connection with `connection_established`, answers
//! pings, echoes `chat` messages verbatim and acts on two control messages:
//! `{"type":"close","code":N}` closes with code N and `{"type":"drop"}` drops
//! the TCP stream without a close frame.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use resocket::config::ClientConfig;
use resocket::domain::{close, ConnectionPhase};
use resocket::runtime::{ClientEvent, ConnectionError, ReconnectingClient};
use resocket::testkit::config;
use resocket::testkit::events::{collect_until, wait_for};

const DEADLINE: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct ServerLog {
    accepted: Arc<AtomicU32>,
    paths: Arc<Mutex<Vec<String>>>,
    close_codes: Arc<Mutex<Vec<u16>>>,
}

impl ServerLog {
    fn accepted(&self) -> u32 {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn spawn_server() -> (SocketAddr, ServerLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = ServerLog::default();
    let server_log = log.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            server_log.accepted.fetch_add(1, Ordering::SeqCst);
            let log = server_log.clone();
            tokio::spawn(async move {
                let paths = Arc::clone(&log.paths);
                let record_path =
                    move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        paths.lock().unwrap().push(req.uri().path().to_string());
                        Ok(resp)
                    };
                if let Ok(ws) = accept_hdr_async(stream, record_path).await {
                    serve(ws, log).await;
                }
            });
        }
    });

    (addr, log)
}

async fn serve(mut ws: WebSocketStream<TcpStream>, log: ServerLog) {
    let greeting = json!({
        "type": "connection_established",
        "client_id": "server-1",
        "message": "welcome",
    });
    if ws.send(Message::Text(greeting.to_string())).await.is_err() {
        return;
    }

    while let Some(Ok(msg)) = ws.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(frame) => {
                let code = frame.map_or(close::NO_STATUS, |f| u16::from(f.code));
                log.close_codes.lock().unwrap().push(code);
                return;
            }
            _ => continue,
        };
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        let reply = match value["type"].as_str() {
            Some("ping") => json!({"type": "pong", "timestamp": value["timestamp"]}).to_string(),
            Some("chat") => text,
            Some("drop") => return,
            Some("close") => {
                let code = value["code"]
                    .as_u64()
                    .and_then(|c| u16::try_from(c).ok())
                    .unwrap_or(1000);
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: "requested".into(),
                };
                let _ = ws.close(Some(frame)).await;
                while let Some(Ok(_)) = ws.next().await {}
                return;
            }
            _ => json!({"type": "echo", "data": value}).to_string(),
        };
        if ws.send(Message::Text(reply)).await.is_err() {
            return;
        }
    }
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        url: format!("ws://{addr}/ws/{{client_id}}"),
        ..config::fast(3)
    }
}

async fn open(client: &ReconnectingClient, events: &mut broadcast::Receiver<ClientEvent>) {
    assert!(client.connect().await.unwrap().is_started());
    tokio::time::timeout(DEADLINE, wait_for(events, |e| matches!(e, ClientEvent::Opened { .. })))
        .await
        .expect("client did not open");
}

#[tokio::test]
async fn round_trips_application_messages() {
    let (addr, log) = spawn_server().await;
    let client = ReconnectingClient::websocket(client_config(addr));
    let mut events = client.subscribe();
    open(&client, &mut events).await;

    assert!(client.send(&json!({"type": "chat", "text": "hello"})));
    let reply = tokio::time::timeout(
        DEADLINE,
        wait_for(&mut events, |e| matches!(e, ClientEvent::Message(_))),
    )
    .await
    .unwrap();
    let ClientEvent::Message(message) = reply else {
        unreachable!()
    };
    assert_eq!(message.kind, "chat");
    assert_eq!(message.payload, json!({"type": "chat", "text": "hello"}));

    let debug = client.debug_snapshot();
    assert_eq!(debug.server_client_id.as_deref(), Some("server-1"));

    let paths = log.paths.lock().unwrap().clone();
    assert_eq!(paths.len(), 1);
    let id = debug.client_id.unwrap();
    assert_eq!(paths[0], format!("/ws/{id}"));
}

#[tokio::test]
async fn echo_replies_are_not_forwarded() {
    let (addr, _log) = spawn_server().await;
    let client = ReconnectingClient::websocket(client_config(addr));
    let mut events = client.subscribe();
    open(&client, &mut events).await;

    assert!(client.send(&json!({"type": "note", "n": 1})));
    assert!(client.send(&json!({"type": "chat", "n": 2})));
    let seen = tokio::time::timeout(
        DEADLINE,
        collect_until(&mut events, |e| matches!(e, ClientEvent::Message(_))),
    )
    .await
    .unwrap();
    let messages: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Message(m) => Some(m.kind.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(messages, vec!["chat"]);
}

#[tokio::test]
async fn heartbeat_receives_pong() {
    let (addr, _log) = spawn_server().await;
    let client = ReconnectingClient::websocket(ClientConfig {
        ping_interval_ms: 50,
        ..client_config(addr)
    });
    let mut events = client.subscribe();
    open(&client, &mut events).await;

    tokio::time::timeout(DEADLINE, async {
        while client.debug_snapshot().last_heartbeat_at.is_none() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("no pong recorded");
}

#[tokio::test]
async fn normal_server_close_is_final() {
    let (addr, log) = spawn_server().await;
    let client = ReconnectingClient::websocket(client_config(addr));
    let mut events = client.subscribe();
    open(&client, &mut events).await;

    assert!(client.send(&json!({"type": "close", "code": 1000})));
    let closed = tokio::time::timeout(
        DEADLINE,
        wait_for(&mut events, |e| matches!(e, ClientEvent::Closed { .. })),
    )
    .await
    .unwrap();
    assert!(matches!(closed, ClientEvent::Closed { code: 1000, .. }));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.snapshot().phase, ConnectionPhase::Closed);
    assert!(client.debug_snapshot().armed_timers.is_empty());
    assert_eq!(log.accepted(), 1);
}

#[tokio::test]
async fn application_close_reconnects() {
    let (addr, log) = spawn_server().await;
    let client = ReconnectingClient::websocket(client_config(addr));
    let mut events = client.subscribe();
    open(&client, &mut events).await;

    assert!(client.send(&json!({"type": "close", "code": 4001})));
    let seen = tokio::time::timeout(
        DEADLINE,
        collect_until(&mut events, |e| matches!(e, ClientEvent::Opened { .. })),
    )
    .await
    .unwrap();
    assert!(seen.iter().any(|e| matches!(e, ClientEvent::Closed { code: 4001, .. })));
    assert!(seen
        .iter()
        .any(|e| matches!(e, ClientEvent::ReconnectScheduled { attempt: 1, .. })));
    assert_eq!(log.accepted(), 2);
}

#[tokio::test]
async fn dropped_stream_is_abnormal() {
    let (addr, log) = spawn_server().await;
    let client = ReconnectingClient::websocket(client_config(addr));
    let mut events = client.subscribe();
    open(&client, &mut events).await;

    assert!(client.send(&json!({"type": "drop"})));
    let closed = tokio::time::timeout(
        DEADLINE,
        wait_for(&mut events, |e| matches!(e, ClientEvent::Closed { .. })),
    )
    .await
    .unwrap();
    assert!(matches!(closed, ClientEvent::Closed { code: close::ABNORMAL, .. }));

    tokio::time::timeout(
        DEADLINE,
        wait_for(&mut events, |e| matches!(e, ClientEvent::Opened { .. })),
    )
    .await
    .expect("client did not reconnect");
    assert_eq!(log.accepted(), 2);
}

#[tokio::test]
async fn disconnect_sends_normal_close() {
    let (addr, log) = spawn_server().await;
    let client = ReconnectingClient::websocket(client_config(addr));
    let mut events = client.subscribe();
    open(&client, &mut events).await;

    client.disconnect().await.unwrap();
    tokio::time::timeout(DEADLINE, async {
        while log.close_codes.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("server saw no close frame");
    assert_eq!(*log.close_codes.lock().unwrap(), vec![close::NORMAL]);
    assert!(!client.send(&json!({"type": "chat"})));
}

#[tokio::test]
async fn refused_connection_reports_failure() {
    // Reserve a port, then free it so nothing is listening.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = ReconnectingClient::websocket(client_config(addr));
    let mut events = client.subscribe();

    assert!(client.connect().await.unwrap().is_started());
    let err = tokio::time::timeout(
        DEADLINE,
        wait_for(&mut events, |e| matches!(e, ClientEvent::Error(_))),
    )
    .await
    .unwrap();
    assert!(matches!(
        err,
        ClientEvent::Error(ConnectionError::ConnectFailed { .. })
    ));
    client.disconnect().await.unwrap();
}
