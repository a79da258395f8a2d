//! Reconnecting research connection.
//!
//! An older connection kind that streams parsed events to its owner instead
//! of driving a session. An abnormal close schedules one retry after a fixed
//! delay; a successful reconnect re-arms the retry. A caller-initiated close
//! never retries.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::connection::WsStream;
use crate::processor::NORMAL_CLOSE;
use crate::protocol::{parse_frame, ResearchRequest, ServerEvent};

const ABNORMAL_CLOSE: u16 = 1006;

/// When to reconnect after an abnormal close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Consecutive retries allowed before giving up.
    pub max_consecutive: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(crate::config::DEFAULT_LEGACY_RETRY_DELAY_MS),
            max_consecutive: 1,
        }
    }
}

/// Notifications from a [`LegacyConnection`].
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyEvent {
    /// Handshake done and request sent. `attempt` starts at 1.
    Connected { attempt: u32 },
    Frame(ServerEvent),
    Closed { code: u16 },
    RetryScheduled { delay: Duration },
    /// Abnormal close with no retries left.
    GaveUp,
}

pub struct LegacyConnection {
    close_tx: mpsc::UnboundedSender<()>,
    events: mpsc::UnboundedReceiver<LegacyEvent>,
    task: JoinHandle<()>,
}

impl LegacyConnection {
    /// Start connecting to `url`. Must be called from within a tokio runtime.
    pub fn connect(url: impl Into<String>, request: ResearchRequest, policy: RetryPolicy) -> Self {
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(url.into(), request, policy, close_rx, events_tx));
        Self {
            close_tx,
            events,
            task,
        }
    }

    /// Close intentionally. No retry follows.
    pub fn close(&self) {
        let _ = self.close_tx.send(());
    }

    /// Next notification, or `None` once the connection has stopped for good.
    pub async fn next_event(&mut self) -> Option<LegacyEvent> {
        self.events.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum Ended {
    Manual,
    Closed(u16),
}

async fn run(
    url: String,
    request: ResearchRequest,
    policy: RetryPolicy,
    mut close_rx: mpsc::UnboundedReceiver<()>,
    events: mpsc::UnboundedSender<LegacyEvent>,
) {
    let mut attempt = 0u32;
    let mut retries = 0u32;

    loop {
        attempt += 1;
        let ended = match connect_async(url.as_str()).await {
            Ok((mut ws, _)) => {
                retries = 0;
                serve(&mut ws, &request, attempt, &mut close_rx, &events).await
            }
            Err(e) => {
                log::warn!("Legacy connection attempt {attempt} failed: {e}");
                Ended::Closed(ABNORMAL_CLOSE)
            }
        };

        let code = match ended {
            Ended::Manual => {
                let _ = events.send(LegacyEvent::Closed { code: NORMAL_CLOSE });
                return;
            }
            Ended::Closed(code) => code,
        };

        let _ = events.send(LegacyEvent::Closed { code });
        if code == NORMAL_CLOSE {
            return;
        }

        if retries >= policy.max_consecutive {
            log::warn!("Legacy connection closed abnormally ({code}); giving up");
            let _ = events.send(LegacyEvent::GaveUp);
            return;
        }
        retries += 1;

        log::info!("Legacy connection closed abnormally ({code}); retrying in {:?}", policy.delay);
        let _ = events.send(LegacyEvent::RetryScheduled {
            delay: policy.delay,
        });

        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = close_rx.recv() => {
                log::debug!("Legacy connection closed during retry delay");
                return;
            }
        }
    }
}

async fn serve(
    ws: &mut WsStream,
    request: &ResearchRequest,
    attempt: u32,
    close_rx: &mut mpsc::UnboundedReceiver<()>,
    events: &mpsc::UnboundedSender<LegacyEvent>,
) -> Ended {
    let json = match serde_json::to_string(request) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to encode request: {e}");
            return Ended::Closed(ABNORMAL_CLOSE);
        }
    };
    if let Err(e) = ws.send(Message::Text(json.into())).await {
        log::warn!("Failed to send request: {e}");
        return Ended::Closed(ABNORMAL_CLOSE);
    }
    let _ = events.send(LegacyEvent::Connected { attempt });

    let mut manual = false;
    let mut close_open = true;
    loop {
        tokio::select! {
            signal = close_rx.recv(), if close_open && !manual => {
                if signal.is_none() {
                    close_open = false;
                }
                manual = true;
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: String::new().into(),
                };
                if let Err(e) = ws.close(Some(frame)).await {
                    log::debug!("Close frame not sent: {e}");
                    return Ended::Manual;
                }
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => match parse_frame(text.as_str()) {
                    Ok(event) => {
                        let _ = events.send(LegacyEvent::Frame(event));
                    }
                    Err(e) => log::warn!("Dropping frame: {e}"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let _ = ws.flush().await;
                    if manual {
                        return Ended::Manual;
                    }
                    return Ended::Closed(frame.map(|f| u16::from(f.code)).unwrap_or(NORMAL_CLOSE));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if manual {
                        return Ended::Manual;
                    }
                    log::warn!("Legacy connection error: {e}");
                    return Ended::Closed(ABNORMAL_CLOSE);
                }
                None => {
                    return if manual { Ended::Manual } else { Ended::Closed(ABNORMAL_CLOSE) };
                }
            },
        }
    }
}
