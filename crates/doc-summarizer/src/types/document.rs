//! Uploaded document records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an uploaded document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Upload URL issued, file not confirmed yet
    AwaitingUpload,
    /// Summary job is on the queue
    Queued,
    /// Worker picked up the job
    Processing,
    /// Summary stored
    Completed,
    /// Job failed; see `Document::error`
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingUpload => "awaiting_upload",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "awaiting_upload" => Self::AwaitingUpload,
            "queued" => Self::Queued,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            _ => Self::Failed,
        }
    }

    /// Whether a summary job may be (re-)enqueued from this state
    pub fn can_enqueue(&self) -> bool {
        matches!(self, Self::AwaitingUpload | Self::Failed)
    }

    /// Whether the document has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// An uploaded PDF owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Owning user
    pub user_id: String,
    /// Original filename as provided by the client
    pub filename: String,
    /// Declared content type
    pub content_type: String,
    /// Object storage key
    pub file_key: String,
    /// Canonical URL of the stored object (what the worker downloads)
    pub file_url: String,
    /// Size in bytes once the upload is confirmed
    pub size_bytes: Option<u64>,
    /// Current status
    pub status: DocumentStatus,
    /// Page count once extracted
    pub page_count: Option<u32>,
    /// Last failure message
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a document record awaiting its upload
    pub fn new(
        id: Uuid,
        user_id: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        file_key: impl Into<String>,
        file_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            file_key: file_key.into(),
            file_url: file_url.into(),
            size_bytes: None,
            status: DocumentStatus::AwaitingUpload,
            page_count: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Object key for an upload: `uploads/{user}/{document}/{filename}`
pub fn object_key(user_id: &str, document_id: &Uuid, filename: &str) -> String {
    format!(
        "uploads/{}/{}/{}",
        sanitize_segment(user_id),
        document_id,
        sanitize_filename(filename)
    )
}

/// Keep filenames safe for use as an object key segment
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned = sanitize_segment(base);
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Whether a filename/content type pair describes a PDF
pub fn is_pdf(filename: &str, content_type: Option<&str>) -> bool {
    let by_name = filename.to_lowercase().ends_with(".pdf");
    match content_type {
        Some(ct) => by_name && (ct == "application/pdf" || ct == "application/octet-stream"),
        None => by_name,
    }
}
