//! Common test utilities: a scripted fake research server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde_json::json;

use dossier_core::controller::SessionObserver;
use dossier_core::protocol::LogEntry;
use dossier_core::{DossierConfig, DossierContext, Session};

/// Marker recorded when the client's first frame was a close.
pub const CLOSE_MARKER: &str = "CLOSE";

/// One thing the server does after reading the request frame.
#[derive(Debug, Clone)]
pub enum Step {
    Send(String),
    Sleep(Duration),
    /// Send a close frame with this code and stop.
    Close(u16),
    /// Read until the client closes, record it, and stop.
    AwaitClose,
}

pub fn event(kind: &str, output: &str) -> Step {
    Step::Send(json!({"type": kind, "output": output}).to_string())
}

pub fn raw(frame: &str) -> Step {
    Step::Send(frame.to_string())
}

#[derive(Clone)]
struct ServerState {
    /// Scripts by connection index; the last one repeats.
    scripts: Arc<Vec<Vec<Step>>>,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
}

pub struct FakeServer {
    pub url: String,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    /// Serve the same script to every connection.
    pub async fn start(script: Vec<Step>) -> Self {
        Self::start_many(vec![script]).await
    }

    pub async fn start_many(scripts: Vec<Vec<Step>>) -> Self {
        let state = ServerState {
            scripts: Arc::new(scripts),
            connections: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        };
        let connections = Arc::clone(&state.connections);
        let received = Arc::clone(&state.received);

        let app = Router::new()
            .route("/ws/research", get(ws_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("ws://{addr}/ws/research"),
            connections,
            received,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Frames received from clients, in order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until at least `count` frames were received.
    pub async fn wait_for_received(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let received = self.received();
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("server received {:?}, wanted {count} frames", self.received());
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ServerState) {
    let index = state.connections.fetch_add(1, Ordering::SeqCst);
    let script = state
        .scripts
        .get(index)
        .or_else(|| state.scripts.last())
        .cloned()
        .unwrap_or_default();

    match socket.recv().await {
        Some(Ok(Message::Text(text))) => state.received.lock().unwrap().push(text.to_string()),
        Some(Ok(Message::Close(_))) | None => {
            state.received.lock().unwrap().push(CLOSE_MARKER.to_string());
            return;
        }
        _ => return,
    }

    for step in script {
        match step {
            Step::Send(frame) => {
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    return;
                }
            }
            Step::Sleep(duration) => tokio::time::sleep(duration).await,
            Step::Close(code) => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: String::new().into(),
                    })))
                    .await;
                // Let the close handshake finish.
                while let Some(Ok(_)) = socket.recv().await {}
                return;
            }
            Step::AwaitClose => {
                while let Some(Ok(message)) = socket.recv().await {
                    if let Message::Close(_) = message {
                        state.received.lock().unwrap().push(CLOSE_MARKER.to_string());
                        break;
                    }
                }
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

/// A context whose history lives in a leaked temp dir.
pub fn test_context(server_url: &str) -> DossierContext {
    let tmp = Box::leak(Box::new(tempfile::TempDir::new().unwrap()));
    DossierContext::builder()
        .config_dir(tmp.path().to_path_buf())
        .config(DossierConfig {
            server_url: server_url.to_string(),
            log_dir: Some("logs".into()),
            ..DossierConfig::default()
        })
        .build()
}

/// Observer that records every notification as a short string.
#[derive(Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SessionObserver for RecordingObserver {
    fn on_start(&self, _session: &Session) {
        self.push("start".to_string());
    }

    fn on_log(&self, _session: &Session, entry: &LogEntry) {
        self.push(format!("log:{}", entry.kind.as_str()));
    }

    fn on_complete(&self, session: &Session) {
        self.push(format!("complete:{}", session.report));
    }

    fn on_error(&self, _session: &Session, message: &str) {
        self.push(format!("error:{message}"));
    }
}
