//! Wire types for the research streaming protocol.
//!
//! # Shape
//!
//! One WebSocket per session. The client sends a single request frame:
//!
//! ```json
//! {"query": "...", "report_type": "research_report", "report_format": "markdown",
//!  "tone": "objective", "report_source": "web"}
//! ```
//!
//! The server then streams typed progress frames:
//!
//! ```json
//! {"type": "search", "output": "🔍 Searching...", "timestamp": "..."}
//! {"type": "report", "output": "## Findings\n"}
//! {"type": "completed", "output": "done", "report": "...", "sources": [], "images": [], "costs": 0.12}
//! ```

mod parser;

pub use parser::{decode_image, decode_source, parse_frame};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Image, Session, Source};

/// Request-level defaults the user does not pick per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefaults {
    pub report_format: String,
    pub tone: String,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            report_format: "markdown".to_string(),
            tone: "objective".to_string(),
        }
    }
}

/// The initiation message, sent exactly once per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    pub report_type: String,
    pub report_format: String,
    pub tone: String,
    pub report_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement_source_urls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
}

impl ResearchRequest {
    /// Build the normalized request for a session.
    ///
    /// URL and document fields are only present when non-empty; the
    /// complement flag travels with the URLs.
    pub fn from_session(session: &Session, defaults: &RequestDefaults) -> Self {
        let has_urls = !session.source_urls.is_empty();
        let has_docs = !session.document_ids.is_empty();

        Self {
            query: session.query.clone(),
            report_type: session.report_type.as_str().to_string(),
            report_format: defaults.report_format.clone(),
            tone: defaults.tone.clone(),
            report_source: session.report_source.as_str().to_string(),
            source_urls: has_urls.then(|| session.source_urls.clone()),
            complement_source_urls: has_urls.then_some(session.complement_source_urls),
            document_ids: has_docs.then(|| session.document_ids.clone()),
        }
    }
}

/// Type tag of a server frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Plan,
    Search,
    Scrape,
    Analyze,
    Report,
    Source,
    Image,
    Completed,
    /// Free-form progress lines.
    Logs,
    /// Server-side failure.
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Plan => "plan",
            EventKind::Search => "search",
            EventKind::Scrape => "scrape",
            EventKind::Analyze => "analyze",
            EventKind::Report => "report",
            EventKind::Source => "source",
            EventKind::Image => "image",
            EventKind::Completed => "completed",
            EventKind::Logs => "logs",
            EventKind::Error => "error",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(EventKind::Plan),
            "search" => Ok(EventKind::Search),
            "scrape" => Ok(EventKind::Scrape),
            "analyze" => Ok(EventKind::Analyze),
            "report" => Ok(EventKind::Report),
            "source" => Ok(EventKind::Source),
            "image" => Ok(EventKind::Image),
            "completed" => Ok(EventKind::Completed),
            "logs" => Ok(EventKind::Logs),
            "error" => Ok(EventKind::Error),
            other => Err(other.to_string()),
        }
    }
}

/// One entry in the session's progress log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub kind: EventKind,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

/// Final payload carried by a `completed` frame.
///
/// Each field is `None` when the frame omitted it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedPayload {
    pub report: Option<String>,
    pub sources: Option<Vec<Source>>,
    pub images: Option<Vec<Image>>,
    pub costs: Option<f64>,
}

/// A parsed server frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub kind: EventKind,
    /// Textual payload. Non-string outputs are rendered as compact JSON.
    pub output: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Present only for `completed`.
    pub completed: Option<CompletedPayload>,
}

impl ServerEvent {
    pub fn new(kind: EventKind, output: impl Into<String>) -> Self {
        Self {
            kind,
            output: Some(output.into()),
            timestamp: Utc::now(),
            completed: None,
        }
    }

    pub fn completed(payload: CompletedPayload) -> Self {
        Self {
            kind: EventKind::Completed,
            output: None,
            timestamp: Utc::now(),
            completed: Some(payload),
        }
    }
}
