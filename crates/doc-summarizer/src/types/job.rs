//! Summary job records and broker messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "processing" => Self::Processing,
            "complete" => Self::Complete,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Processing stage within a job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Downloading,
    Extracting,
    Summarizing,
    Storing,
    Complete,
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Summarizing => "summarizing",
            Self::Storing => "storing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "downloading" => Self::Downloading,
            "extracting" => Self::Extracting,
            "summarizing" => Self::Summarizing,
            "storing" => Self::Storing,
            "complete" => Self::Complete,
            _ => Self::Failed,
        }
    }
}

/// A persisted summary job: one per enqueue of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryJob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub file_url: String,
    pub user_id: String,
    pub status: JobStatus,
    pub stage: JobStage,
    /// Number of times a worker started this job
    pub attempts: u32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SummaryJob {
    pub fn new(document_id: Uuid, file_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id,
            file_url: file_url.into(),
            user_id: user_id.into(),
            status: JobStatus::Queued,
            stage: JobStage::Queued,
            attempts: 0,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// The payload pushed onto the broker
    pub fn message(&self) -> JobMessage {
        JobMessage {
            job_id: self.id,
            document_id: self.document_id,
            file_url: self.file_url.clone(),
            user_id: self.user_id.clone(),
        }
    }

    /// Wall-clock processing time, once finished
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Broker payload: `{job_id, document_id, file_url, user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub file_url: String,
    pub user_id: String,
}

impl JobMessage {
    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
