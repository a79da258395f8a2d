//! The connection task: one WebSocket, one session, one event at a time.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{ConnectionOutcome, ConnectionPhase, ControllerCommand, SessionObserver};
use crate::error::{ConnectionError, ParseError};
use crate::handoff::CompletionHandoff;
use crate::logging::{Direction, ProtocolLog};
use crate::processor::{EventProcessor, FinalizeReason, Finalized, NORMAL_CLOSE};
use crate::protocol::{parse_frame, ResearchRequest};
use crate::session::{AppState, Session, SessionStatus};

pub(super) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code assumed when the peer vanishes without a close frame.
const ABNORMAL_CLOSE: u16 = 1006;

pub(super) struct ConnectionTask {
    pub server_url: String,
    pub request: ResearchRequest,
    pub session: Session,
    pub processor: EventProcessor,
    pub observer: Arc<dyn SessionObserver>,
    pub commands: mpsc::UnboundedReceiver<ControllerCommand>,
    pub phase: watch::Sender<ConnectionPhase>,
    pub state: Arc<AppState>,
    pub handoff: CompletionHandoff,
    pub log: ProtocolLog,
    pub record_id: Option<String>,
}

impl ConnectionTask {
    pub async fn run(mut self) -> ConnectionOutcome {
        self.set_phase(ConnectionPhase::Connecting);

        // Commands are not polled during the handshake, so a close requested
        // now stays queued until the connection is open or has failed.
        let connected = connect_async(self.server_url.as_str()).await;

        let mut ws = match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                let message = ConnectionError::Connect(e.to_string()).to_string();
                self.log.line(Direction::Event, &message);
                let finalized = self.processor.on_transport_error(&mut self.session, message);
                self.finish(finalized).await;
                return self.into_outcome();
            }
        };

        if self.drain_commands() {
            log::info!(
                "Close requested during handshake for session {}; closing without sending request",
                self.session.id
            );
            self.set_phase(ConnectionPhase::Closing);
            send_normal_close(&mut ws).await;
            self.log.line(Direction::Event, "closed before initiation");
            return self.into_outcome();
        }

        if let Err(e) = self.send_request(&mut ws).await {
            let finalized = self
                .processor
                .on_transport_error(&mut self.session, e.to_string());
            self.finish(finalized).await;
            return self.into_outcome();
        }

        self.set_phase(ConnectionPhase::Open);
        self.session.status = SessionStatus::Running;
        self.publish();
        self.observer.on_start(&self.session);

        self.read_loop(&mut ws).await;
        self.into_outcome()
    }

    async fn read_loop(&mut self, ws: &mut WsStream) {
        let mut commands_open = true;
        let mut closing = false;

        loop {
            tokio::select! {
                command = self.commands.recv(), if commands_open => {
                    let close = match command {
                        Some(ControllerCommand::SetObserver(observer)) => {
                            self.observer = observer;
                            false
                        }
                        Some(ControllerCommand::Close) => true,
                        None => {
                            // Controller dropped.
                            commands_open = false;
                            true
                        }
                    };
                    if close && !closing {
                        closing = true;
                        self.set_phase(ConnectionPhase::Closing);
                        log::debug!("Closing research connection for session {}", self.session.id);
                        send_normal_close(ws).await;
                    }
                }
                frame = ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()).await,
                        Some(Ok(Message::Binary(_))) => {
                            log::warn!("Dropping frame: {}", ParseError::Binary);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code)).unwrap_or(NORMAL_CLOSE);
                            self.log.line(Direction::Event, &format!("close {code}"));
                            let finalized = self.processor.on_close(&mut self.session, code);
                            self.finish(finalized).await;
                            // Push out the queued close reply.
                            let _ = ws.flush().await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                            let code = if closing { NORMAL_CLOSE } else { ABNORMAL_CLOSE };
                            self.log.line(Direction::Event, &format!("stream ended ({code})"));
                            let finalized = self.processor.on_close(&mut self.session, code);
                            self.finish(finalized).await;
                            break;
                        }
                        Some(Err(e)) => {
                            let message = ConnectionError::Transport(e.to_string()).to_string();
                            self.log.line(Direction::Event, &message);
                            let finalized = self.processor.on_transport_error(&mut self.session, message);
                            self.finish(finalized).await;
                            break;
                        }
                    }
                }
            }
        }

        self.set_phase(ConnectionPhase::Closed);
    }

    async fn handle_text(&mut self, text: &str) {
        self.log.line(Direction::Received, text);

        let event = match parse_frame(text) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Dropping frame for session {}: {}", self.session.id, e);
                return;
            }
        };

        let logs_before = self.session.logs.len();
        let finalized = self.processor.apply(&mut self.session, event);

        if finalized.is_none() {
            self.publish();
        }
        if self.session.logs.len() > logs_before {
            if let Some(entry) = self.session.logs.last() {
                self.observer.on_log(&self.session, entry);
            }
        }
        self.finish(finalized).await;
    }

    async fn send_request(&mut self, ws: &mut WsStream) -> Result<(), ConnectionError> {
        let json = serde_json::to_string(&self.request)
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        self.log.line(Direction::Sent, &json);
        ws.send(Message::Text(json.into()))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    /// Apply queued commands without waiting. Returns true when a close was
    /// requested (or the controller is gone).
    fn drain_commands(&mut self) -> bool {
        let mut close = false;
        loop {
            match self.commands.try_recv() {
                Ok(ControllerCommand::SetObserver(observer)) => self.observer = observer,
                Ok(ControllerCommand::Close) => close = true,
                Err(mpsc::error::TryRecvError::Empty) => return close,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Publish, record and notify for a terminal snapshot.
    ///
    /// The history write runs on the blocking pool; the task waits for it so
    /// the outcome carries the record id.
    async fn finish(&mut self, finalized: Option<Finalized>) {
        let Some(Finalized { session, reason }) = finalized else {
            return;
        };

        let active = self.state.publish(Arc::new(session.clone()));
        if active {
            let handoff = self.handoff.clone();
            let snapshot = session.clone();
            match tokio::task::spawn_blocking(move || handoff.record(&snapshot)).await {
                Ok(Ok(id)) => self.record_id = id,
                Ok(Err(e)) => log::error!("Failed to record session {}: {}", session.id, e),
                Err(e) => log::error!("History write for session {} failed: {}", session.id, e),
            }
        } else {
            log::info!("Session {} was reset before finishing; not recording", session.id);
        }

        match reason {
            FinalizeReason::Completed | FinalizeReason::CleanClose => {
                self.observer.on_complete(&session);
            }
            FinalizeReason::Failed => {
                let message = session.error.as_deref().unwrap_or("Unknown error");
                self.observer.on_error(&session, message);
            }
        }
    }

    fn publish(&self) {
        self.state.publish(Arc::new(self.session.clone()));
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.phase.send_replace(phase);
    }

    fn into_outcome(self) -> ConnectionOutcome {
        self.phase.send_replace(ConnectionPhase::Closed);
        ConnectionOutcome {
            session: self.session,
            record_id: self.record_id,
        }
    }
}

async fn send_normal_close(ws: &mut WsStream) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: String::new().into(),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        log::debug!("Close frame not sent: {e}");
    }
}
