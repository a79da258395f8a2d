//! Markdown export of a finished report.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::persistence::HistoryRecord;
use crate::session::{Image, ReportType, Session, Source};

/// Characters of the query used for the file name.
const FILE_NAME_CHARS: usize = 50;

/// The parts of a report that go into an export.
#[derive(Debug, Clone, Copy)]
pub struct ExportView<'a> {
    pub query: &'a str,
    pub report_type: ReportType,
    pub report: &'a str,
    pub sources: &'a [Source],
    pub images: &'a [Image],
    pub costs: f64,
}

impl<'a> From<&'a Session> for ExportView<'a> {
    fn from(session: &'a Session) -> Self {
        Self {
            query: &session.query,
            report_type: session.report_type,
            report: &session.report,
            sources: &session.sources,
            images: &session.images,
            costs: session.costs,
        }
    }
}

impl<'a> From<&'a HistoryRecord> for ExportView<'a> {
    fn from(record: &'a HistoryRecord) -> Self {
        Self {
            query: &record.query,
            report_type: record.report_type,
            report: &record.report,
            sources: &record.sources,
            images: &record.images,
            costs: record.costs,
        }
    }
}

/// Render the export document.
pub fn render_markdown(view: ExportView<'_>, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", view.query);
    let _ = writeln!(
        out,
        "**Generated:** {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "**Sources:** {}", view.sources.len());
    let _ = writeln!(out, "**Cost:** ${:.4}", view.costs);
    let _ = writeln!(out, "**Report type:** {}", view.report_type.label());
    out.push_str("\n---\n\n## Sources\n\n");

    for (i, source) in view.sources.iter().enumerate() {
        match &source.title {
            Some(title) => {
                let _ = writeln!(out, "{}. [{}]({})", i + 1, title, source.url);
            }
            None => {
                let _ = writeln!(out, "{}. {}", i + 1, source.url);
            }
        }
    }

    if !view.images.is_empty() {
        out.push_str("\n## Images\n\n");
        for (i, image) in view.images.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, image.url);
        }
    }

    out.push_str("\n---\n\n## Report\n\n");
    out.push_str(view.report);
    out.push('\n');
    out
}

/// File name for an export: the leading query characters with path
/// separators replaced, plus `.md`.
pub fn file_name(query: &str) -> String {
    let stem: String = query
        .trim()
        .chars()
        .take(FILE_NAME_CHARS)
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let stem = if stem.is_empty() { "report".to_string() } else { stem };
    format!("{stem}.md")
}

/// Write the export into `dir` and return its path.
pub fn write_export(dir: &Path, view: ExportView<'_>) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(view.query));
    fs::write(&path, render_markdown(view, Utc::now()))?;
    Ok(path)
}
