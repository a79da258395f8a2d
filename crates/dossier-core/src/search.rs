//! Debounced history search.
//!
//! Each keystroke calls [`DebouncedSearch::submit`]. A search runs only after
//! the quiet period passes with no newer submission, and its result is
//! applied only if no newer submission arrived while it ran. Both checks use
//! a generation counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::PersistenceError;
use crate::persistence::{HistoryRecord, HistoryStore};

/// Anything that can answer a keyword search.
pub trait SearchBackend: Send + Sync + 'static {
    fn search(&self, keyword: &str) -> Result<Vec<HistoryRecord>, PersistenceError>;
}

impl SearchBackend for HistoryStore {
    fn search(&self, keyword: &str) -> Result<Vec<HistoryRecord>, PersistenceError> {
        HistoryStore::search(self, keyword)
    }
}

/// Latest applied search result.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub keyword: String,
    pub records: Arc<Vec<HistoryRecord>>,
    /// Generation of the submission that produced this result.
    pub generation: u64,
}

pub struct DebouncedSearch<B: SearchBackend> {
    backend: Arc<B>,
    delay: Duration,
    generation: Arc<AtomicU64>,
    results: watch::Sender<SearchState>,
}

impl<B: SearchBackend> DebouncedSearch<B> {
    pub fn new(backend: Arc<B>, delay: Duration) -> Self {
        let (results, _) = watch::channel(SearchState::default());
        Self {
            backend,
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            results,
        }
    }

    /// Schedule a search for `keyword`, superseding any pending one.
    ///
    /// Returns the generation assigned to this submission. Must be called
    /// from within a tokio runtime.
    pub fn submit(&self, keyword: impl Into<String>) -> u64 {
        let keyword = keyword.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let backend = Arc::clone(&self.backend);
        let latest = Arc::clone(&self.generation);
        let results = self.results.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }

            let query = keyword.clone();
            let found = tokio::task::spawn_blocking(move || backend.search(&query)).await;

            let records = match found {
                Ok(Ok(records)) => records,
                // A failed search still settles its generation, with no hits.
                Ok(Err(e)) => {
                    log::warn!("History search for '{keyword}' failed: {e}");
                    Vec::new()
                }
                Err(e) => {
                    log::warn!("History search task failed: {e}");
                    Vec::new()
                }
            };

            if latest.load(Ordering::SeqCst) != generation {
                log::debug!("Discarding stale search result for '{keyword}'");
                return;
            }
            results.send_replace(SearchState {
                keyword,
                records: Arc::new(records),
                generation,
            });
        });

        generation
    }

    pub fn current(&self) -> SearchState {
        self.results.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.results.subscribe()
    }
}
