//! Completion handoff: one finalized session, one history record.

use std::sync::Arc;

use crate::error::PersistenceError;
use crate::persistence::{HistoryStore, NewHistoryRecord};
use crate::session::{AppState, Session, SessionStatus};

/// Writes finalized sessions to the history store and refreshes the cache.
///
/// Callers reach this only through the processor's one-shot guard, so each
/// session is recorded at most once.
#[derive(Clone)]
pub struct CompletionHandoff {
    store: Arc<HistoryStore>,
    state: Arc<AppState>,
}

impl CompletionHandoff {
    pub fn new(store: Arc<HistoryStore>, state: Arc<AppState>) -> Self {
        Self { store, state }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Persist a finalized session. Returns the new record id, or `None` when
    /// the session had no query and was skipped.
    pub fn record(&self, session: &Session) -> Result<Option<String>, PersistenceError> {
        if session.query.trim().is_empty() {
            log::warn!("Not recording session {}: query is empty", session.id);
            return Ok(None);
        }

        let id = self.store.save(to_new_record(session))?;
        log::info!(
            "Recorded session {} as history record {} ({})",
            session.id,
            id,
            session.status.as_str()
        );

        if let Err(e) = self.state.reload_history(&self.store) {
            log::warn!("Failed to reload history after recording {id}: {e}");
        }
        Ok(Some(id))
    }
}

fn to_new_record(session: &Session) -> NewHistoryRecord {
    match session.status {
        SessionStatus::Error => NewHistoryRecord {
            query: session.query.clone(),
            report_type: session.report_type,
            status: SessionStatus::Error,
            report: format!(
                "Research failed: {}",
                session.error.as_deref().unwrap_or("Unknown error")
            ),
            sources: Vec::new(),
            costs: 0.0,
            images: Vec::new(),
        },
        status => NewHistoryRecord {
            query: session.query.clone(),
            report_type: session.report_type,
            status,
            report: session.report.clone(),
            sources: session.sources.clone(),
            costs: session.costs,
            images: session.images.clone(),
        },
    }
}
