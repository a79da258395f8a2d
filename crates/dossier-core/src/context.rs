//! DossierContext - the shared state a front end works with.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │     DossierContext      │
//!                    ├─────────────────────────┤
//!                    │  - DossierConfig        │
//!                    │  - AppState             │
//!                    │  - HistoryStore         │
//!                    │  - CompletionHandoff    │
//!                    │  - config_dir           │
//!                    └───────────┬─────────────┘
//!                                │
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!   SessionController     DebouncedSearch       DocumentClient
//! ```
//!
//! Front ends build one context at startup and derive controllers and
//! clients from it. Cloning the context clones `Arc`s.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DossierConfig;
use crate::controller::{ControllerConfig, LegacyConnection, RetryPolicy, SessionController};
use crate::documents::{DocumentClient, UploadFilter};
use crate::error::DossierError;
use crate::handoff::CompletionHandoff;
use crate::persistence::HistoryStore;
use crate::protocol::ResearchRequest;
use crate::search::DebouncedSearch;
use crate::session::{AppState, SubmitParams};

/// Configuration for building a DossierContext.
#[derive(Default)]
pub struct DossierContextBuilder {
    config_dir: Option<PathBuf>,
    config: Option<DossierConfig>,
    state: Option<Arc<AppState>>,
    store: Option<Arc<HistoryStore>>,
}

impl DossierContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding `config.json`; relative data and log paths resolve
    /// against it. Defaults to the current directory.
    pub fn config_dir(mut self, dir: PathBuf) -> Self {
        self.config_dir = Some(dir);
        self
    }

    pub fn config(mut self, config: DossierConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing AppState (for testing or custom configurations).
    pub fn state(mut self, state: Arc<AppState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Use an existing HistoryStore (for testing or custom configurations).
    pub fn store(mut self, store: Arc<HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the context. The history cache is loaded from the store; a
    /// store that cannot be read yields an empty cache and a warning.
    pub fn build(self) -> DossierContext {
        let config_dir = self.config_dir.unwrap_or_else(|| PathBuf::from("."));
        let config = self.config.unwrap_or_default();
        let state = self.state.unwrap_or_else(|| Arc::new(AppState::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(HistoryStore::new(config.history_dir(&config_dir))));

        if let Err(e) = state.reload_history(&store) {
            log::warn!("Failed to load history from {}: {}", store.dir().display(), e);
        }

        let handoff = CompletionHandoff::new(Arc::clone(&store), Arc::clone(&state));

        DossierContext {
            config_dir,
            config: Arc::new(config),
            state,
            store,
            handoff,
        }
    }
}

#[derive(Clone)]
pub struct DossierContext {
    config_dir: PathBuf,
    pub config: Arc<DossierConfig>,
    pub state: Arc<AppState>,
    pub store: Arc<HistoryStore>,
    pub handoff: CompletionHandoff,
}

impl DossierContext {
    pub fn builder() -> DossierContextBuilder {
        DossierContextBuilder::new()
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// A controller for one view, wired to this context's state and store.
    pub fn controller(&self) -> SessionController {
        let config = ControllerConfig {
            server_url: self.config.server_url.clone(),
            request_defaults: self.config.request_defaults(),
            log_dir: self.config.log_dir(&self.config_dir),
        };
        SessionController::new(config, Arc::clone(&self.state), self.handoff.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: self.config.legacy_retry_delay(),
            ..RetryPolicy::default()
        }
    }

    /// Open a reconnecting connection for a validated submission. It streams
    /// events to the caller and does not touch the view or the history.
    pub fn legacy_connection(&self, params: &SubmitParams) -> Result<LegacyConnection, DossierError> {
        let session = params.validate()?;
        let request = ResearchRequest::from_session(&session, &self.config.request_defaults());
        Ok(LegacyConnection::connect(
            self.config.server_url.clone(),
            request,
            self.retry_policy(),
        ))
    }

    pub fn search(&self) -> DebouncedSearch<HistoryStore> {
        DebouncedSearch::new(Arc::clone(&self.store), self.config.search_debounce())
    }

    pub fn documents(&self) -> DocumentClient {
        DocumentClient::new(
            self.config.api_base_url.clone(),
            UploadFilter::new(self.config.max_upload_bytes),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LegacyEvent;
    use crate::persistence::NewHistoryRecord;
    use std::time::Duration;
    use crate::session::{ReportType, SessionStatus};
    use tempfile::tempdir;

    #[test]
    fn builder_uses_config_dir_for_history() {
        let dir = tempdir().unwrap();
        let ctx = DossierContext::builder()
            .config_dir(dir.path().to_path_buf())
            .build();

        assert_eq!(ctx.config_dir(), &dir.path().to_path_buf());
        assert_eq!(ctx.store.dir(), dir.path().join("data").join("history"));
    }

    #[test]
    fn builder_uses_provided_state_and_store() {
        let dir = tempdir().unwrap();
        let state = Arc::new(AppState::new());
        let store = Arc::new(HistoryStore::new(dir.path()));

        let ctx = DossierContext::builder()
            .state(Arc::clone(&state))
            .store(Arc::clone(&store))
            .build();

        assert!(Arc::ptr_eq(&ctx.state, &state));
        assert!(Arc::ptr_eq(&ctx.store, &store));
        assert!(Arc::ptr_eq(ctx.handoff.store(), &store));
    }

    #[test]
    fn build_loads_existing_history() {
        let dir = tempdir().unwrap();
        let store = Arc::new(HistoryStore::new(dir.path()));
        store
            .save(NewHistoryRecord {
                query: "earlier".to_string(),
                report_type: ReportType::ResearchReport,
                status: SessionStatus::Completed,
                report: "r".to_string(),
                sources: vec![],
                costs: 0.0,
                images: vec![],
            })
            .unwrap();

        let ctx = DossierContext::builder().store(store).build();
        assert_eq!(ctx.state.history().len(), 1);
    }

    #[test]
    fn context_is_cheaply_clonable() {
        let dir = tempdir().unwrap();
        let ctx = DossierContext::builder()
            .config_dir(dir.path().to_path_buf())
            .build();
        let ctx2 = ctx.clone();
        assert!(Arc::ptr_eq(&ctx.state, &ctx2.state));
        assert!(Arc::ptr_eq(&ctx.config, &ctx2.config));
    }

    #[test]
    fn retry_policy_uses_configured_delay() {
        let ctx = DossierContext::builder()
            .config(DossierConfig {
                legacy_retry_delay_ms: 250,
                ..DossierConfig::default()
            })
            .build();
        let policy = ctx.retry_policy();
        assert_eq!(policy.delay, Duration::from_millis(250));
        assert_eq!(policy.max_consecutive, RetryPolicy::default().max_consecutive);
    }

    #[tokio::test]
    async fn legacy_connection_retries_after_configured_delay() {
        // Port 9 (discard) is not listening on loopback.
        let ctx = DossierContext::builder()
            .config(DossierConfig {
                server_url: "ws://127.0.0.1:9/ws/research".to_string(),
                legacy_retry_delay_ms: 5,
                ..DossierConfig::default()
            })
            .build();

        let mut connection = ctx.legacy_connection(&SubmitParams::new("q")).unwrap();
        assert_eq!(
            connection.next_event().await,
            Some(LegacyEvent::Closed { code: 1006 })
        );
        assert_eq!(
            connection.next_event().await,
            Some(LegacyEvent::RetryScheduled {
                delay: Duration::from_millis(5)
            })
        );
        connection.close();
    }

    #[test]
    fn legacy_connection_validates_submission() {
        let ctx = DossierContext::builder().build();
        let result = ctx.legacy_connection(&SubmitParams::new("  "));
        assert!(matches!(result, Err(DossierError::Validation(_))));
    }

    #[test]
    fn documents_client_uses_configured_limit() {
        let ctx = DossierContext::builder()
            .config(DossierConfig {
                max_upload_bytes: 10,
                ..DossierConfig::default()
            })
            .build();
        assert_eq!(ctx.documents().filter().max_bytes, 10);
    }
}
