//! Session model and the state container that publishes it.
//!
//! A session is created from a validated submission, mutated only by the
//! event processor (through the controller), and published into
//! [`AppState`] as a fresh `Arc` on every change.

mod app_state;
mod state;
mod validation;

pub use app_state::{AppState, ViewSnapshot};
pub use state::{
    Image, ReportSource, ReportType, Session, SessionId, SessionStatus, Source, Step, ViewState,
};
pub use validation::{normalize_source_url, normalize_source_urls, SubmitParams};
