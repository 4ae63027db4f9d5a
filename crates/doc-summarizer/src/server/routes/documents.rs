//! Document lifecycle endpoints: completion, polling, results, deletion

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Document, DocumentStatus, JobStage, JobStatus, Summary, SummaryJob};

const MAX_PAGE_SIZE: usize = 200;

/// Response after a job has been queued
#[derive(Debug, Serialize)]
pub struct JobQueuedResponse {
    pub document_id: Uuid,
    pub job_id: Uuid,
    pub status: DocumentStatus,
    pub message: String,
}

/// Job details exposed to clients
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub status: JobStatus,
    pub stage: JobStage,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl From<&SummaryJob> for JobView {
    fn from(job: &SummaryJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            stage: job.stage,
            attempts: job.attempts,
            error: job.error.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            duration_ms: job.duration_ms(),
        }
    }
}

/// Polling response
#[derive(Debug, Serialize)]
pub struct DocumentStatusResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing documents
#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for document list
#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
    /// Total count (before pagination)
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub document_id: Uuid,
    pub message: String,
}

fn owned_document(state: &AppState, id: &Uuid, user_id: &str) -> Result<Document> {
    state
        .database()
        .get_document_for_user(id, user_id)?
        .ok_or_else(|| Error::NotFound(format!("Document {} not found", id)))
}

/// POST /api/documents/:id/complete - Confirm the upload and queue summarization
pub async fn complete_upload(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<JobQueuedResponse>)> {
    let document = owned_document(&state, &id, &user_id)?;

    if !document.status.can_enqueue() {
        return Err(Error::Conflict(format!(
            "Document {} is already {}",
            id,
            document.status.as_str()
        )));
    }

    let size = state
        .object_store()
        .head_object(&document.file_key)
        .await?
        .ok_or_else(|| Error::Conflict(format!("Upload for document {} has not been received", id)))?;

    let max_size = state.config().server.max_upload_size as u64;
    if size > max_size {
        return Err(Error::PayloadTooLarge(format!(
            "File is {} bytes, limit is {}",
            size, max_size
        )));
    }

    state.database().set_document_upload(&id, size)?;
    let job = state.job_queue().enqueue(&document).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobQueuedResponse {
            document_id: id,
            job_id: job.id,
            status: DocumentStatus::Queued,
            message: format!("Summary queued. Poll /api/documents/{}/status for progress.", id),
        }),
    ))
}

/// GET /api/documents/:id/status - Document, job and summary state for polling
pub async fn document_status(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentStatusResponse>> {
    let document = owned_document(&state, &id, &user_id)?;
    let job = state.database().latest_job_for_document(&id)?;
    let summary = match document.status {
        DocumentStatus::Completed => state.database().get_summary(&id)?,
        _ => None,
    };

    Ok(Json(DocumentStatusResponse {
        document_id: document.id,
        filename: document.filename,
        status: document.status,
        page_count: document.page_count,
        job: job.as_ref().map(JobView::from),
        summary,
        error: document.error,
        updated_at: document.updated_at,
    }))
}

/// GET /api/documents/:id/summary - The finished summary
pub async fn get_summary(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Summary>> {
    let document = owned_document(&state, &id, &user_id)?;

    state
        .database()
        .get_summary(&document.id)?
        .map(Json)
        .ok_or_else(|| {
            Error::NotFound(format!(
                "Summary for document {} is not ready (status: {})",
                id,
                document.status.as_str()
            ))
        })
}

/// GET /api/documents - List the caller's documents, newest first
pub async fn list_documents(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(params): Query<ListDocumentsQuery>,
) -> Result<Json<DocumentListResponse>> {
    let limit = params.limit.clamp(1, MAX_PAGE_SIZE);
    let database = state.database();

    let documents = database.list_documents_for_user(&user_id, limit, params.offset)?;
    let total = database.count_documents_for_user(&user_id)?;

    Ok(Json(DocumentListResponse {
        documents,
        total,
        offset: params.offset,
        limit,
    }))
}

/// DELETE /api/documents/:id - Remove a document, its file, jobs and summary
pub async fn delete_document(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteDocumentResponse>> {
    let document = owned_document(&state, &id, &user_id)?;

    state.object_store().delete_object(&document.file_key).await?;
    state.database().delete_document(&id)?;
    state.job_queue().forget_document(&id);

    tracing::info!("Deleted document {} ({})", id, document.filename);

    Ok(Json(DeleteDocumentResponse {
        document_id: id,
        message: "Document deleted".to_string(),
    }))
}

/// POST /api/documents/:id/retry - Re-queue a failed document
pub async fn retry_document(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<JobQueuedResponse>)> {
    let document = owned_document(&state, &id, &user_id)?;
    let job = state.job_queue().retry(&document).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobQueuedResponse {
            document_id: id,
            job_id: job.id,
            status: DocumentStatus::Queued,
            message: format!("Retry queued as job {}", job.id),
        }),
    ))
}
