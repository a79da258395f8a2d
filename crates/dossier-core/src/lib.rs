//! # dossier-core
//!
//! Core logic for Dossier, a client for a streaming research server.
//!
//! This crate is front-end agnostic; the `dossier` CLI is a thin wrapper
//! around it.
//!
//! ## Key Concepts
//!
//! - **Session**: one research request and everything streamed back for it
//! - **EventProcessor**: maps server events onto the session, finalizing once
//! - **SessionController**: owns the WebSocket connection for a session
//! - **HistoryStore**: finished sessions on disk, searchable

pub mod config;
pub mod context;
pub mod controller;
pub mod documents;
pub mod error;
pub mod export;
pub mod handoff;
pub mod logging;
pub mod paths;
pub mod persistence;
pub mod processor;
pub mod protocol;
pub mod search;
pub mod session;

// Re-export commonly used types
pub use config::DossierConfig;
pub use context::DossierContext;
pub use controller::{SessionController, SessionObserver};
pub use error::DossierError;
pub use persistence::{HistoryRecord, HistoryStore};
pub use session::{AppState, Session, SessionId, SubmitParams};
