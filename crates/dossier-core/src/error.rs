//! Error taxonomy for Dossier.
//!
//! Each concern has its own error type so call sites can decide what to
//! surface. [`DossierError`] aggregates them for the CLI boundary.

use thiserror::Error;

/// A submission was rejected before any network activity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Static research needs at least one source URL")]
    MissingSourceUrls,

    #[error("Local research needs at least one document")]
    MissingDocuments,

    #[error("Hybrid research needs at least one source URL or document")]
    MissingSourcesOrDocuments,

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),
}

/// A state transition was not allowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A research session is already in progress: {0}")]
    AlreadyInProgress(String),
}

/// The research connection failed to establish or dropped abnormally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Failed to connect to research server: {0}")]
    Connect(String),

    #[error("Connection closed abnormally (code {0})")]
    AbnormalClose(u16),

    #[error("Connection error: {0}")]
    Transport(String),
}

/// An incoming frame could not be understood.
///
/// Parse errors are never fatal: the frame is logged and dropped.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Binary frames are not supported")]
    Binary,
}

/// The history store failed to read, write or delete.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A document upload was rejected or failed.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

/// Configuration could not be loaded or saved.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Any Dossier error, for callers that only need to report it.
#[derive(Error, Debug)]
pub enum DossierError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("History record not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_name_the_missing_input() {
        assert_eq!(
            ValidationError::MissingSourceUrls.to_string(),
            "Static research needs at least one source URL"
        );
        assert_eq!(
            ValidationError::InvalidUrl("ht!tp".to_string()).to_string(),
            "Invalid source URL: ht!tp"
        );
    }

    #[test]
    fn too_large_reports_both_sizes() {
        let err = UploadError::TooLarge {
            size: 60,
            limit: 50,
        };
        assert_eq!(err.to_string(), "File too large: 60 bytes (limit 50 bytes)");
    }

    #[test]
    fn dossier_error_is_transparent() {
        let err: DossierError = ConnectionError::AbnormalClose(1006).into();
        assert_eq!(err.to_string(), "Connection closed abnormally (code 1006)");
    }
}
