//! Client for the document management API.
//!
//! Documents are the inputs of `local` and `hybrid` research. Every upload
//! passes the [`UploadFilter`] first; a rejected file never reaches the
//! network.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::UploadError;

/// Extensions the server can index (lowercase, without the dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "csv", "xlsx", "xls", "md", "ppt", "pptx", "docx", "doc",
];

/// A document known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Stored name on the server.
    #[serde(default)]
    pub filename: Option<String>,
    /// Name as uploaded. Only upload responses carry it.
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_size: u64,
    /// ISO 8601, as sent by the server (may lack a timezone).
    #[serde(default)]
    pub uploaded_at: String,
}

impl Document {
    /// Best name to show for this document.
    pub fn display_name(&self) -> &str {
        self.original_filename
            .as_deref()
            .or(self.filename.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Client-side acceptance rules for uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFilter {
    pub max_bytes: u64,
}

impl Default for UploadFilter {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadFilter {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Accept or reject a file by name and size.
    pub fn check(&self, file_name: &str, size: u64) -> Result<(), UploadError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(UploadError::UnsupportedType(file_name.to_string()));
        }
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct DocumentClient {
    http: reqwest::Client,
    base_url: String,
    filter: UploadFilter,
}

impl DocumentClient {
    pub fn new(base_url: impl Into<String>, filter: UploadFilter) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            filter,
        }
    }

    pub fn filter(&self) -> &UploadFilter {
        &self.filter
    }

    /// `GET /documents/`
    pub async fn list(&self) -> Result<Vec<Document>, UploadError> {
        let response = self
            .http
            .get(format!("{}/documents/", self.base_url))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Upload a file from disk.
    pub async fn upload(&self, path: &Path) -> Result<Document, UploadError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let size = std::fs::metadata(path)?.len();
        self.filter.check(&file_name, size)?;

        let bytes = std::fs::read(path)?;
        self.send_upload(file_name, bytes).await
    }

    /// Upload in-memory content under `file_name`.
    pub async fn upload_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Document, UploadError> {
        self.filter.check(file_name, bytes.len() as u64)?;
        self.send_upload(file_name.to_string(), bytes).await
    }

    /// `DELETE /documents/{id}`
    pub async fn delete(&self, id: &str) -> Result<(), UploadError> {
        let response = self
            .http
            .delete(format!("{}/documents/{}", self.base_url, id))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn send_upload(&self, file_name: String, bytes: Vec<u8>) -> Result<Document, UploadError> {
        log::info!("Uploading {} ({} bytes)", file_name, bytes.len());
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .http
            .post(format!("{}/documents/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.detail)
        .unwrap_or(body);
    Err(UploadError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    mod filter {
        use super::*;

        #[test]
        fn accepts_known_extensions_case_insensitively() {
            let filter = UploadFilter::default();
            for name in ["report.pdf", "notes.TXT", "Deck.PptX", "data.csv", "README.md"] {
                assert!(filter.check(name, 10).is_ok(), "{name} should be accepted");
            }
        }

        #[test]
        fn rejects_unknown_extensions() {
            let filter = UploadFilter::default();
            for name in ["setup.exe", "archive.zip", "no_extension", ".pdf"] {
                assert!(
                    matches!(filter.check(name, 10), Err(UploadError::UnsupportedType(_))),
                    "{name} should be rejected"
                );
            }
        }

        #[test]
        fn rejects_oversize_files() {
            let filter = UploadFilter::new(100);
            assert!(filter.check("a.pdf", 100).is_ok());
            match filter.check("a.pdf", 101) {
                Err(UploadError::TooLarge { size, limit }) => {
                    assert_eq!((size, limit), (101, 100));
                }
                other => panic!("Expected TooLarge, got {other:?}"),
            }
        }

        #[test]
        fn default_limit_is_fifty_megabytes() {
            assert_eq!(UploadFilter::default().max_bytes, 50 * 1024 * 1024);
        }
    }

    #[test]
    fn document_parses_list_entry_without_original_name() {
        let doc: Document = serde_json::from_str(
            r#"{"id":"abc","filename":"abc.pdf","file_type":"pdf","file_size":12,"uploaded_at":"2025-03-01T10:00:00","file_path":"/docs/abc.pdf"}"#,
        )
        .unwrap();
        assert_eq!(doc.display_name(), "abc.pdf");
        assert_eq!(doc.original_filename, None);
        assert_eq!(doc.file_size, 12);
    }

    #[tokio::test]
    async fn rejected_upload_never_calls_the_server() {
        // Nothing listens on this port; reaching the network would error
        // with Http instead of UnsupportedType.
        let client = DocumentClient::new("http://127.0.0.1:9", UploadFilter::default());
        let err = client.upload_bytes("virus.exe", vec![0; 4]).await.unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
    }
}
