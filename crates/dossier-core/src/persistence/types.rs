//! History record types and the fields derived from a finished report.
//!
//! Records are stored one per file as camelCase JSON:
//!
//! ```json
//! {
//!   "id": "3f2c...",
//!   "createdAt": "2025-03-01T10:00:00Z",
//!   "completedAt": "2025-03-01T10:00:00Z",
//!   "title": "AI in healthcare 2025",
//!   "wordCount": 1234,
//!   "preview": "Findings ...",
//!   "query": "AI in healthcare 2025",
//!   "reportType": "research_report",
//!   "status": "completed",
//!   "report": "## Findings ...",
//!   "sources": [{"url": "https://..."}],
//!   "costs": 0.12,
//!   "images": []
//! }
//! ```

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::{Image, ReportType, SessionStatus, Source};

/// Maximum title length, in characters.
pub const TITLE_MAX_CHARS: usize = 50;

/// Maximum preview length, in characters.
pub const PREVIEW_MAX_CHARS: usize = 200;

pub const UNTITLED: &str = "Untitled research";

/// A finished session as stored on disk. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub title: String,
    pub word_count: usize,
    pub preview: String,
    pub query: String,
    pub report_type: ReportType,
    pub status: SessionStatus,
    pub report: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub costs: f64,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Input to [`HistoryStore::save`](super::HistoryStore::save).
///
/// Id, timestamps and the derived fields are filled in by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryRecord {
    pub query: String,
    pub report_type: ReportType,
    pub status: SessionStatus,
    pub report: String,
    pub sources: Vec<Source>,
    pub costs: f64,
    pub images: Vec<Image>,
}

impl NewHistoryRecord {
    /// Complete the record with an id, timestamps and derived fields.
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            id,
            created_at: now,
            completed_at: now,
            title: derive_title(&self.query),
            word_count: count_words(&self.report),
            preview: derive_preview(&self.report),
            query: self.query,
            report_type: self.report_type,
            status: self.status,
            report: self.report,
            sources: self.sources,
            costs: self.costs,
            images: self.images,
        }
    }
}

/// Aggregate numbers about the history store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_records: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

// ============================================================================
// Derived fields
// ============================================================================

/// The query cut to [`TITLE_MAX_CHARS`], or [`UNTITLED`] if blank.
pub fn derive_title(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}

/// Count words: whitespace-separated runs, with every CJK ideograph counted
/// as a word of its own.
pub fn count_words(text: &str) -> usize {
    let mut count = 0;
    for token in text.split_whitespace() {
        let mut in_run = false;
        for c in token.chars() {
            if is_cjk(c) {
                count += 1;
                in_run = false;
            } else if !in_run {
                count += 1;
                in_run = true;
            }
        }
    }
    count
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*```.*$").unwrap());
static IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s*").unwrap());
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*>\s?").unwrap());
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").unwrap());
static HORIZONTAL_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").unwrap());
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+|`+|~~|__").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip markdown markup and collapse whitespace.
pub fn strip_markdown(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "");
    let text = HORIZONTAL_RULE.replace_all(&text, "");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Leading [`PREVIEW_MAX_CHARS`] characters of the plain-text report.
pub fn derive_preview(report: &str) -> String {
    strip_markdown(report).chars().take(PREVIEW_MAX_CHARS).collect()
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

// ============================================================================
// TESTS
// ============================================================================
