//! Persistence layer for finished research sessions.
//!
//! # File Locations
//!
//! ```text
//! <data_dir>/                      (default ~/.config/dossier/data)
//! └── history/
//!     ├── <record-id>.json         # One finished session
//!     └── ...
//! ```
//!
//! # Design Principles
//!
//! ## Atomic Writes
//!
//! Every save writes `<id>.json.tmp` and renames it into place, so a crash
//! never leaves a half-written record behind.
//!
//! ## Append Only
//!
//! Records are created and deleted, never updated. Each save allocates a
//! fresh id.

pub mod history;
pub mod types;

pub use history::HistoryStore;
pub use types::*;
