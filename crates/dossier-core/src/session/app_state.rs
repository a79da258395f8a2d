//! AppState - the single in-memory source of truth for the view.
//!
//! Holds the top-level view mode, the active session and the history cache.
//! A saved record can be loaded back into the progress view; it is tracked
//! by `selected_history_id` until the view is reset or the record deleted.
//! Every update replaces the published `Arc` wholesale, so subscribers can
//! detect change by identity with [`Arc::ptr_eq`].

use std::sync::Arc;

use tokio::sync::watch;

use super::state::{Session, SessionId, ViewState};
use crate::error::{DossierError, PersistenceError, SessionError};
use crate::persistence::{HistoryRecord, HistoryStore};

/// What observers see: the view mode and, in progress, the session.
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    pub view: ViewState,
    pub session: Option<Arc<Session>>,
    /// Set when the session on display was loaded from a history record.
    pub selected_history_id: Option<String>,
}

impl ViewSnapshot {
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| &s.id)
    }
}

pub struct AppState {
    view: watch::Sender<ViewSnapshot>,
    history: watch::Sender<Arc<Vec<HistoryRecord>>>,
}

impl AppState {
    pub fn new() -> Self {
        let (view, _) = watch::channel(ViewSnapshot::default());
        let (history, _) = watch::channel(Arc::new(Vec::new()));
        Self { view, history }
    }

    /// Move from input to progress with a validated session.
    pub fn start(&self, session: Session) -> Result<Arc<Session>, SessionError> {
        let session = Arc::new(session);
        let mut rejected = None;

        self.view.send_if_modified(|snapshot| {
            if snapshot.view == ViewState::Progress {
                rejected = Some(
                    snapshot
                        .session_id()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                );
                return false;
            }
            *snapshot = ViewSnapshot {
                view: ViewState::Progress,
                session: Some(Arc::clone(&session)),
                selected_history_id: None,
            };
            true
        });

        match rejected {
            Some(current) => Err(SessionError::AlreadyInProgress(current)),
            None => {
                log::info!("Started session {} ({})", session.id, session.query);
                Ok(session)
            }
        }
    }

    /// Discard the active session and return to input. Never persists.
    pub fn reset(&self) {
        self.view.send_modify(|snapshot| {
            if let Some(id) = snapshot.session_id() {
                log::info!("Reset session {id}");
            }
            *snapshot = ViewSnapshot::default();
        });
    }

    /// Replace the active session. Returns false (and changes nothing) when
    /// `session` no longer belongs to the active view.
    pub fn publish(&self, session: Arc<Session>) -> bool {
        self.view.send_if_modified(|snapshot| {
            if snapshot.session_id() != Some(&session.id) {
                log::debug!("Dropping update for inactive session {}", session.id);
                return false;
            }
            snapshot.session = Some(Arc::clone(&session));
            true
        })
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.view.subscribe()
    }

    pub fn history(&self) -> Arc<Vec<HistoryRecord>> {
        Arc::clone(&self.history.borrow())
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Arc<Vec<HistoryRecord>>> {
        self.history.subscribe()
    }

    /// Show a saved record in the progress view. Returns false when the
    /// record does not exist.
    ///
    /// Replaces a finished session or another loaded record, but never a
    /// session that is still running.
    pub fn load_from_history(&self, store: &HistoryStore, id: &str) -> Result<bool, DossierError> {
        let Some(record) = store.get(id)? else {
            return Ok(false);
        };
        let loaded = Arc::new(Session::from_record(&record));
        let mut rejected = None;

        self.view.send_if_modified(|snapshot| {
            let running = snapshot
                .session
                .as_ref()
                .filter(|s| snapshot.selected_history_id.is_none() && !s.status.is_terminal());
            if let Some(current) = running {
                rejected = Some(current.id.to_string());
                return false;
            }
            *snapshot = ViewSnapshot {
                view: ViewState::Progress,
                session: Some(Arc::clone(&loaded)),
                selected_history_id: Some(record.id.clone()),
            };
            true
        });

        match rejected {
            Some(current) => Err(SessionError::AlreadyInProgress(current).into()),
            None => {
                log::debug!("Loaded history record {id} into the view");
                Ok(true)
            }
        }
    }

    /// Delete a saved record and refresh the cache. If that record is on
    /// display the view returns to input.
    pub fn delete_from_history(&self, store: &HistoryStore, id: &str) -> Result<(), PersistenceError> {
        store.delete(id)?;
        self.reload_history(store)?;
        self.view.send_if_modified(|snapshot| {
            if snapshot.selected_history_id.as_deref() != Some(id) {
                return false;
            }
            *snapshot = ViewSnapshot::default();
            true
        });
        Ok(())
    }

    /// Refresh the history cache by re-querying the store.
    pub fn reload_history(&self, store: &HistoryStore) -> Result<(), PersistenceError> {
        let records = store.list_all()?;
        self.history.send_replace(Arc::new(records));
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
