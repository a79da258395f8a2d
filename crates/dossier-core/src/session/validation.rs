//! Submission validation.
//!
//! A [`Session`] only exists once its submission passed these checks, so
//! everything downstream can assume a non-empty query and the inputs the
//! chosen source mode needs.

use reqwest::Url;

use super::state::{ReportSource, ReportType, Session};
use crate::error::ValidationError;

/// What the user submitted from the input view.
#[derive(Debug, Clone, Default)]
pub struct SubmitParams {
    pub query: String,
    pub report_type: ReportType,
    pub report_source: ReportSource,
    pub source_urls: Vec<String>,
    pub complement_source_urls: bool,
    pub document_ids: Vec<String>,
}

impl SubmitParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Check the submission and build a pending session from it.
    pub fn validate(&self) -> Result<Session, ValidationError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }

        let source_urls = normalize_source_urls(&self.source_urls)?;
        let document_ids: Vec<String> = self
            .document_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        match self.report_source {
            ReportSource::Static if source_urls.is_empty() => {
                return Err(ValidationError::MissingSourceUrls)
            }
            ReportSource::Local if document_ids.is_empty() => {
                return Err(ValidationError::MissingDocuments)
            }
            ReportSource::Hybrid if source_urls.is_empty() && document_ids.is_empty() => {
                return Err(ValidationError::MissingSourcesOrDocuments)
            }
            _ => {}
        }

        let mut session = Session::new(query, self.report_type, self.report_source);
        session.source_urls = source_urls;
        session.complement_source_urls = self.complement_source_urls;
        session.document_ids = document_ids;
        Ok(session)
    }
}

/// Normalize a single user-entered URL.
///
/// Adds `https://` when no scheme is given and rejects anything that does
/// not parse as an http(s) URL.
pub fn normalize_source_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let has_scheme = trimmed
        .get(..8)
        .map(|p| p.eq_ignore_ascii_case("https://"))
        .unwrap_or(false)
        || trimmed
            .get(..7)
            .map(|p| p.eq_ignore_ascii_case("http://"))
            .unwrap_or(false);

    let candidate = if has_scheme {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() => Ok(url.to_string()),
        _ => Err(ValidationError::InvalidUrl(raw.to_string())),
    }
}

/// Normalize a URL list, dropping blanks and duplicates while keeping order.
pub fn normalize_source_urls(raw: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut urls: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw.iter().filter(|u| !u.trim().is_empty()) {
        let url = normalize_source_url(entry)?;
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    fn params(source: ReportSource, urls: &[&str], docs: &[&str]) -> SubmitParams {
        SubmitParams {
            query: "AI in healthcare 2025".to_string(),
            report_source: source,
            source_urls: urls.iter().map(|s| s.to_string()).collect(),
            document_ids: docs.iter().map(|s| s.to_string()).collect(),
            ..SubmitParams::default()
        }
    }

    #[test]
    fn empty_query_is_rejected() {
        let err = SubmitParams::new("   ").validate().unwrap_err();
        assert_eq!(err, ValidationError::EmptyQuery);
    }

    #[test]
    fn web_needs_only_a_query() {
        let session = params(ReportSource::Web, &[], &[]).validate().unwrap();
        assert_eq!(session.query, "AI in healthcare 2025");
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[test]
    fn static_without_urls_is_rejected() {
        let err = params(ReportSource::Static, &[], &[]).validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingSourceUrls);
    }

    #[test]
    fn static_with_blank_urls_is_rejected() {
        let err = params(ReportSource::Static, &["  "], &[]).validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingSourceUrls);
    }

    #[test]
    fn local_without_documents_is_rejected() {
        let err = params(ReportSource::Local, &["example.com"], &[])
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingDocuments);
    }

    #[test]
    fn hybrid_accepts_either_input() {
        assert!(params(ReportSource::Hybrid, &["example.com"], &[]).validate().is_ok());
        assert!(params(ReportSource::Hybrid, &[], &["doc-1"]).validate().is_ok());
        assert_eq!(
            params(ReportSource::Hybrid, &[], &[]).validate().unwrap_err(),
            ValidationError::MissingSourcesOrDocuments
        );
    }

    #[test]
    fn query_is_trimmed() {
        let session = SubmitParams::new("  quantum batteries ").validate().unwrap();
        assert_eq!(session.query, "quantum batteries");
    }

    mod urls {
        use super::*;

        #[test]
        fn adds_https_when_scheme_missing() {
            assert_eq!(
                normalize_source_url("example.com/page").unwrap(),
                "https://example.com/page"
            );
        }

        #[test]
        fn keeps_http_scheme() {
            assert_eq!(
                normalize_source_url("HTTP://example.com").unwrap(),
                "http://example.com/"
            );
        }

        #[test]
        fn rejects_garbage() {
            assert!(matches!(
                normalize_source_url("http://"),
                Err(ValidationError::InvalidUrl(_))
            ));
        }

        #[test]
        fn drops_duplicates_in_order() {
            let urls = normalize_source_urls(&[
                "b.com".to_string(),
                "a.com".to_string(),
                "https://b.com".to_string(),
            ])
            .unwrap();
            assert_eq!(urls, vec!["https://b.com/", "https://a.com/"]);
        }
    }
}
