//! Session controller: owns the live research connection.
//!
//! # Architecture
//!
//! ```text
//!   SessionController ──commands──▶ ConnectionTask (tokio task)
//!        │                              │  owns: WebSocket, EventProcessor,
//!        │                              │        working Session, observer
//!        │◀──────── phase (watch) ──────┤
//!        │                              ├──publish──▶ AppState
//!        │                              └──finalize─▶ CompletionHandoff
//! ```
//!
//! A controller drives at most one live connection. Commands (close,
//! observer replacement) travel over a channel so they are serialized with
//! incoming frames; a close sent while the handshake is still running waits
//! in the channel until the handshake resolves.

mod connection;
mod legacy;

pub use legacy::{LegacyConnection, LegacyEvent, RetryPolicy};

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::DossierError;
use crate::handoff::CompletionHandoff;
use crate::logging::ProtocolLog;
use crate::protocol::{LogEntry, RequestDefaults, ResearchRequest};
use crate::session::{AppState, Session, SubmitParams};
use connection::ConnectionTask;

/// Callbacks for session lifecycle notifications. All methods default to
/// no-ops.
pub trait SessionObserver: Send + Sync {
    /// The initiation message was sent and the session is running.
    fn on_start(&self, _session: &Session) {}

    /// A log entry was appended.
    fn on_log(&self, _session: &Session, _entry: &LogEntry) {}

    /// The session finalized successfully.
    fn on_complete(&self, _session: &Session) {}

    /// The session finalized on the error path.
    fn on_error(&self, _session: &Session, _message: &str) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Lifecycle of the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

pub(crate) enum ControllerCommand {
    Close,
    SetObserver(Arc<dyn SessionObserver>),
}

/// Result of [`SessionController::open`].
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// A new connection was started for this session.
    Opened(Arc<Session>),
    /// A connection was already live; nothing changed.
    AlreadyOpen,
}

/// What a finished connection left behind.
#[derive(Debug, Clone)]
pub struct ConnectionOutcome {
    /// Final state of the working session.
    pub session: Session,
    /// History record written for it, if any.
    pub record_id: Option<String>,
}

/// Settings a controller needs to open connections.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub server_url: String,
    pub request_defaults: RequestDefaults,
    pub log_dir: Option<PathBuf>,
}

struct LiveConnection {
    commands: mpsc::UnboundedSender<ControllerCommand>,
    phase: watch::Receiver<ConnectionPhase>,
    task: Option<JoinHandle<ConnectionOutcome>>,
}

impl LiveConnection {
    fn is_live(&self) -> bool {
        *self.phase.borrow() != ConnectionPhase::Closed
    }
}

/// Drives research sessions for one view.
///
/// Dropping the controller closes its connection.
pub struct SessionController {
    config: ControllerConfig,
    state: Arc<AppState>,
    handoff: CompletionHandoff,
    observer: Arc<dyn SessionObserver>,
    live: Option<LiveConnection>,
}

impl SessionController {
    pub fn new(config: ControllerConfig, state: Arc<AppState>, handoff: CompletionHandoff) -> Self {
        Self {
            config,
            state,
            handoff,
            observer: Arc::new(NoopObserver),
            live: None,
        }
    }

    /// Validate a submission and open a connection for it.
    ///
    /// A no-op returning [`OpenOutcome::AlreadyOpen`] while a connection is
    /// live. Must be called from within a tokio runtime.
    pub fn open(&mut self, params: &SubmitParams) -> Result<OpenOutcome, DossierError> {
        if self.is_live() {
            log::debug!("open() ignored: a connection is already live");
            return Ok(OpenOutcome::AlreadyOpen);
        }

        let session = params.validate()?;
        let started = self.state.start(session)?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Connecting);

        let task = ConnectionTask {
            server_url: self.config.server_url.clone(),
            request: ResearchRequest::from_session(&started, &self.config.request_defaults),
            session: (*started).clone(),
            processor: Default::default(),
            observer: Arc::clone(&self.observer),
            commands: commands_rx,
            phase: phase_tx,
            state: Arc::clone(&self.state),
            handoff: self.handoff.clone(),
            log: ProtocolLog::open(self.config.log_dir.as_deref(), &started.id.0),
            record_id: None,
        };

        log::info!("Opening research connection for session {}", started.id);
        self.live = Some(LiveConnection {
            commands: commands_tx,
            phase: phase_rx,
            task: Some(tokio::spawn(task.run())),
        });

        Ok(OpenOutcome::Opened(started))
    }

    /// Request a normal close. Returns immediately; while the handshake is
    /// still running the close is deferred until it resolves.
    pub fn close(&self) {
        if let Some(live) = &self.live {
            let _ = live.commands.send(ControllerCommand::Close);
        }
    }

    /// Close the connection and return the view to input without recording
    /// anything.
    ///
    /// The old connection is detached: it finishes closing on its own and
    /// the controller is immediately free to [`open`](Self::open) again.
    pub fn reset(&mut self) {
        if let Some(live) = self.live.take() {
            let _ = live.commands.send(ControllerCommand::Close);
        }
        self.state.reset();
    }

    /// Replace the observer. A live connection picks it up for the next
    /// notification.
    pub fn set_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observer = Arc::clone(&observer);
        if let Some(live) = &self.live {
            let _ = live.commands.send(ControllerCommand::SetObserver(observer));
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.as_ref().map(LiveConnection::is_live).unwrap_or(false)
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.live
            .as_ref()
            .map(|live| *live.phase.borrow())
            .unwrap_or_default()
    }

    pub fn subscribe_phase(&self) -> Option<watch::Receiver<ConnectionPhase>> {
        self.live.as_ref().map(|live| live.phase.clone())
    }

    /// Wait for the current connection task to finish.
    ///
    /// Returns `None` if there is no connection or it was already awaited.
    pub async fn wait(&mut self) -> Option<ConnectionOutcome> {
        let task = self.live.as_mut()?.task.take()?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::error!("Research connection task failed: {e}");
                None
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::persistence::HistoryStore;
    use crate::session::{ReportSource, ViewState};
    use tempfile::tempdir;

    fn controller(server_url: &str) -> (tempfile::TempDir, SessionController, Arc<AppState>) {
        let dir = tempdir().unwrap();
        let state = Arc::new(AppState::new());
        let store = Arc::new(HistoryStore::new(dir.path().join("history")));
        let handoff = CompletionHandoff::new(store, Arc::clone(&state));
        let config = ControllerConfig {
            server_url: server_url.to_string(),
            request_defaults: RequestDefaults::default(),
            log_dir: None,
        };
        (dir, SessionController::new(config, Arc::clone(&state), handoff), state)
    }

    #[tokio::test]
    async fn invalid_submission_never_connects() {
        let (_dir, mut controller, state) = controller("ws://127.0.0.1:9/unused");
        let params = SubmitParams {
            query: "q".to_string(),
            report_source: ReportSource::Static,
            ..SubmitParams::default()
        };

        let err = controller.open(&params).unwrap_err();
        assert!(matches!(
            err,
            DossierError::Validation(ValidationError::MissingSourceUrls)
        ));
        assert!(!controller.is_live());
        assert_eq!(controller.phase(), ConnectionPhase::Idle);
        assert_eq!(state.snapshot().view, ViewState::Input);
    }

    #[tokio::test]
    async fn connect_failure_finalizes_as_error() {
        // Port 9 (discard) is not listening on loopback.
        let (_dir, mut controller, state) = controller("ws://127.0.0.1:9/ws/research");
        controller.open(&SubmitParams::new("q")).unwrap();

        let outcome = controller.wait().await.unwrap();
        assert_eq!(outcome.session.status, crate::session::SessionStatus::Error);
        assert!(outcome
            .session
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to connect to research server"));
        assert!(outcome.record_id.is_some());
        assert_eq!(controller.phase(), ConnectionPhase::Closed);
        assert!(!controller.is_live());
        assert_eq!(state.history().len(), 1);
    }

    #[tokio::test]
    async fn reset_detaches_the_connection() {
        let (_dir, mut controller, state) = controller("ws://127.0.0.1:9/ws/research");
        controller.open(&SubmitParams::new("first")).unwrap();
        assert!(controller.is_live());

        controller.reset();
        assert!(!controller.is_live());
        assert_eq!(controller.phase(), ConnectionPhase::Idle);
        assert!(controller.wait().await.is_none());

        let reopened = controller.open(&SubmitParams::new("second")).unwrap();
        assert!(matches!(reopened, OpenOutcome::Opened(_)));
        assert_eq!(state.snapshot().session.unwrap().query, "second");
    }

    #[tokio::test]
    async fn wait_without_connection_is_none() {
        let (_dir, mut controller, _state) = controller("ws://127.0.0.1:9/");
        assert!(controller.wait().await.is_none());
    }
}
