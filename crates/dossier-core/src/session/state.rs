//! Per-session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::persistence::types::HistoryRecord;
use crate::protocol::LogEntry;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which top-level screen is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    #[default]
    Input,
    Progress,
}

/// Lifecycle of a session: `pending → running → {completed | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl SessionStatus {
    /// True once the session reached `completed` or `error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }
}

/// Depth of the research the server should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    ResearchReport,
    Deep,
    MultiAgent,
}

impl ReportType {
    /// Wire name, as sent to the server.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::ResearchReport => "research_report",
            ReportType::Deep => "deep",
            ReportType::MultiAgent => "multi_agent",
        }
    }

    /// Human-readable label used in exports.
    pub fn label(self) -> &'static str {
        match self {
            ReportType::ResearchReport => "Quick research",
            ReportType::Deep => "Deep research",
            ReportType::MultiAgent => "Multi-agent research",
        }
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research_report" => Ok(ReportType::ResearchReport),
            "deep" => Ok(ReportType::Deep),
            "multi_agent" => Ok(ReportType::MultiAgent),
            other => Err(format!("unknown report type: {other}")),
        }
    }
}

/// Where the server should gather material from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    #[default]
    Web,
    Static,
    Local,
    Hybrid,
}

impl ReportSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportSource::Web => "web",
            ReportSource::Static => "static",
            ReportSource::Local => "local",
            ReportSource::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for ReportSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(ReportSource::Web),
            "static" => Ok(ReportSource::Static),
            "local" => Ok(ReportSource::Local),
            "hybrid" => Ok(ReportSource::Hybrid),
            other => Err(format!("unknown report source: {other}")),
        }
    }
}

/// A source the research drew on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Source {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }
}

/// An image collected during research.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Image {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
        }
    }
}

/// Research pipeline stage shown to the user.
///
/// Ordering follows the canonical pipeline so the displayed step can only
/// move forward with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Plan,
    Search,
    Scrape,
    Analyze,
    Report,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Plan,
        Step::Search,
        Step::Scrape,
        Step::Analyze,
        Step::Report,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Plan => "Planning research strategy",
            Step::Search => "Searching for information",
            Step::Scrape => "Scraping web content",
            Step::Analyze => "Analyzing data",
            Step::Report => "Writing report",
        }
    }
}

/// One in-flight or just-finished research request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub query: String,
    pub report_type: ReportType,
    pub report_source: ReportSource,
    pub status: SessionStatus,

    /// Accumulated report text; replaced by the terminal snapshot.
    pub report: String,
    pub sources: Vec<Source>,
    pub images: Vec<Image>,
    pub costs: f64,

    pub source_urls: Vec<String>,
    pub complement_source_urls: bool,
    pub document_ids: Vec<String>,

    /// Displayed pipeline step. Never moves backwards.
    pub step: Step,

    /// Progress log in arrival order.
    pub logs: Vec<LogEntry>,

    /// Failure message when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
}

impl Session {
    /// A fresh pending web session. Submissions go through
    /// [`SubmitParams::validate`](super::SubmitParams::validate) instead.
    pub fn new(query: impl Into<String>, report_type: ReportType, report_source: ReportSource) -> Self {
        Self {
            id: SessionId::new(),
            query: query.into(),
            report_type,
            report_source,
            status: SessionStatus::Pending,
            report: String::new(),
            sources: Vec::new(),
            images: Vec::new(),
            costs: 0.0,
            source_urls: Vec::new(),
            complement_source_urls: false,
            document_ids: Vec::new(),
            step: Step::Plan,
            logs: Vec::new(),
            error: None,
            started_at: Utc::now(),
        }
    }

    /// Rebuild a read-only session from a history record for display.
    pub fn from_record(record: &HistoryRecord) -> Self {
        let mut session = Self::new(record.query.clone(), record.report_type, ReportSource::Web);
        session.status = record.status;
        session.report = record.report.clone();
        session.sources = record.sources.clone();
        session.images = record.images.clone();
        session.costs = record.costs;
        session.step = Step::Report;
        session.started_at = record.created_at;
        session
    }
}
