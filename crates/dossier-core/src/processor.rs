//! Event processor.
//!
//! Maps parsed server events onto a working [`Session`]. The processor is
//! synchronous and owns the one-shot [`Finalization`] guard, so the terminal
//! path runs at most once no matter how many completion signals arrive
//! (`completed` frames, a clean close, an error).

use uuid::Uuid;

use crate::error::ConnectionError;
use crate::protocol::{decode_image, decode_source, EventKind, LogEntry, ServerEvent};
use crate::session::{Session, SessionStatus, Step};

/// WebSocket normal-closure code.
pub const NORMAL_CLOSE: u16 = 1000;

/// One-shot completion guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Finalization {
    #[default]
    Open,
    Finalized,
}

impl Finalization {
    /// Compare-and-set from `Open` to `Finalized`. Returns true only for the
    /// call that performed the transition.
    pub fn try_finalize(&mut self) -> bool {
        match self {
            Finalization::Open => {
                *self = Finalization::Finalized;
                true
            }
            Finalization::Finalized => false,
        }
    }

    pub fn is_finalized(self) -> bool {
        self == Finalization::Finalized
    }
}

/// Which path finalized the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// A `completed` frame arrived.
    Completed,
    /// Normal close with accumulated report text and no `completed` frame.
    CleanClose,
    /// Transport failure, abnormal close or server `error` frame.
    Failed,
}

/// Terminal snapshot handed to the completion handoff.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub session: Session,
    pub reason: FinalizeReason,
}

#[derive(Debug, Default)]
pub struct EventProcessor {
    finalization: Finalization,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalization.is_finalized()
    }

    /// Apply one server event. Returns the terminal snapshot if this event
    /// finalized the session.
    pub fn apply(&mut self, session: &mut Session, event: ServerEvent) -> Option<Finalized> {
        if self.is_finalized() {
            log::debug!(
                "Ignoring '{}' event for finalized session {}",
                event.kind.as_str(),
                session.id
            );
            return None;
        }

        if let Some(step) = step_for(event.kind) {
            session.step = session.step.max(step);
        }

        if event.kind != EventKind::Report {
            session.logs.push(LogEntry {
                id: Uuid::new_v4().to_string(),
                kind: event.kind,
                output: event.output.clone().unwrap_or_default(),
                timestamp: event.timestamp,
            });
        }

        match event.kind {
            EventKind::Report => {
                if let Some(fragment) = event.output {
                    session.report.push_str(&fragment);
                }
                None
            }
            EventKind::Source => {
                if let Some(raw) = event.output.as_deref() {
                    session.sources.push(decode_source(raw));
                }
                None
            }
            EventKind::Image => {
                if let Some(raw) = event.output.as_deref() {
                    session.images.push(decode_image(raw));
                }
                None
            }
            EventKind::Completed => self.complete(session, event),
            EventKind::Error => {
                let message = event
                    .output
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Research server reported an error".to_string());
                self.fail(session, message)
            }
            EventKind::Plan
            | EventKind::Search
            | EventKind::Scrape
            | EventKind::Analyze
            | EventKind::Logs => None,
        }
    }

    /// Handle the connection closing with `code`.
    ///
    /// A normal close with accumulated report text finalizes as completed;
    /// any other code is an error. A normal close with nothing accumulated
    /// leaves the session as it is.
    pub fn on_close(&mut self, session: &mut Session, code: u16) -> Option<Finalized> {
        if self.is_finalized() {
            return None;
        }

        if code != NORMAL_CLOSE {
            return self.fail(session, ConnectionError::AbnormalClose(code).to_string());
        }

        if session.report.is_empty() || !self.finalization.try_finalize() {
            return None;
        }

        session.status = SessionStatus::Completed;
        session.step = Step::Report;
        Some(Finalized {
            session: session.clone(),
            reason: FinalizeReason::CleanClose,
        })
    }

    /// Handle a transport failure on the connection.
    pub fn on_transport_error(
        &mut self,
        session: &mut Session,
        message: impl Into<String>,
    ) -> Option<Finalized> {
        self.fail(session, message.into())
    }

    fn complete(&mut self, session: &mut Session, event: ServerEvent) -> Option<Finalized> {
        if !self.finalization.try_finalize() {
            return None;
        }

        // The terminal payload replaces everything; absent fields are empty.
        let payload = event.completed.unwrap_or_default();
        session.report = payload.report.unwrap_or_default();
        session.sources = payload.sources.unwrap_or_default();
        session.images = payload.images.unwrap_or_default();
        session.costs = payload.costs.unwrap_or(0.0);
        session.step = Step::Report;
        session.status = SessionStatus::Completed;

        Some(Finalized {
            session: session.clone(),
            reason: FinalizeReason::Completed,
        })
    }

    fn fail(&mut self, session: &mut Session, message: String) -> Option<Finalized> {
        if !self.finalization.try_finalize() {
            return None;
        }

        log::warn!("Session {} failed: {}", session.id, message);
        session.status = SessionStatus::Error;
        session.error = Some(message);

        Some(Finalized {
            session: session.clone(),
            reason: FinalizeReason::Failed,
        })
    }
}

fn step_for(kind: EventKind) -> Option<Step> {
    match kind {
        EventKind::Plan => Some(Step::Plan),
        EventKind::Search => Some(Step::Search),
        EventKind::Scrape => Some(Step::Scrape),
        EventKind::Analyze => Some(Step::Analyze),
        EventKind::Report => Some(Step::Report),
        _ => None,
    }
}
