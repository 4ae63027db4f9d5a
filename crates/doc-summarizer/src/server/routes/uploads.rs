//! Upload registration and the signed local upload target

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use super::UserId;
use crate::error::{Error, Result};
use crate::providers::ObjectStore;
use crate::server::state::AppState;
use crate::types::document::{is_pdf, object_key};
use crate::types::Document;

/// Request to register a new upload
#[derive(Debug, Deserialize)]
pub struct CreateUploadRequest {
    /// Original filename
    pub filename: String,
    /// Declared content type (guessed from the filename when absent)
    #[serde(default)]
    pub content_type: Option<String>,
    /// Declared size, checked against the upload limit when present
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// Where and how the client uploads the file
#[derive(Debug, Serialize)]
pub struct CreateUploadResponse {
    pub document_id: Uuid,
    pub upload_url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub file_key: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/uploads - Register a PDF and issue a pre-signed upload URL
pub async fn create_upload(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateUploadRequest>,
) -> Result<(StatusCode, Json<CreateUploadResponse>)> {
    let filename = request.filename.trim();
    if filename.is_empty() {
        return Err(Error::InvalidRequest("filename is required".to_string()));
    }

    let content_type = request
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| mime_guess::from_path(filename).first_or_octet_stream().to_string());

    if !is_pdf(filename, Some(&content_type)) {
        return Err(Error::InvalidRequest(format!(
            "Only PDF files are accepted (got '{}' as {})",
            filename, content_type
        )));
    }

    let max_size = state.config().server.max_upload_size as u64;
    match request.size_bytes {
        Some(0) => return Err(Error::InvalidRequest("File is empty".to_string())),
        Some(size) if size > max_size => {
            return Err(Error::PayloadTooLarge(format!(
                "File is {} bytes, limit is {}",
                size, max_size
            )))
        }
        _ => {}
    }

    let store = state.object_store();
    let document_id = Uuid::new_v4();
    let key = object_key(&user_id, &document_id, filename);
    let upload = store
        .presign_upload(&key, &content_type, state.upload_ttl())
        .await?;

    let document = Document::new(
        document_id,
        user_id,
        filename,
        content_type,
        key.clone(),
        store.object_url(&key),
    );
    state.database().create_document(&document)?;

    tracing::info!(
        "Issued upload URL for document {} ({}) owned by {}",
        document.id,
        document.filename,
        document.user_id
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateUploadResponse {
            document_id,
            upload_url: upload.url,
            method: upload.method,
            headers: upload.headers,
            file_key: key,
            expires_at: upload.expires_at,
        }),
    ))
}

/// Signature parameters of a local upload URL
#[derive(Debug, Deserialize)]
pub struct UploadSignature {
    pub expires: i64,
    pub signature: String,
}

/// Acknowledgement of a stored upload
#[derive(Debug, Serialize)]
pub struct UploadReceipt {
    pub file_key: String,
    pub size_bytes: usize,
    pub sha256: String,
}

/// PUT /api/uploads/*key - Signed upload target for the local object store
pub async fn receive_upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<UploadSignature>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadReceipt>> {
    let store = state
        .local_store()
        .ok_or_else(|| Error::NotFound("Direct uploads are not enabled".to_string()))?;

    store.verify_upload(&key, params.expires, &params.signature)?;

    // The URL outlives the upload; once queued the stored file is frozen
    let document = state
        .database()
        .get_document_by_file_key(&key)?
        .ok_or_else(|| Error::NotFound(format!("No document for upload {}", key)))?;
    if !document.status.can_enqueue() {
        return Err(Error::Conflict(format!(
            "Document {} is {}; its file can no longer be replaced",
            document.id,
            document.status.as_str()
        )));
    }

    if body.is_empty() {
        return Err(Error::InvalidRequest("Upload body is empty".to_string()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    store.put_object(&key, &body, content_type).await?;

    let sha256 = hex::encode(Sha256::digest(&body));
    tracing::info!("Received upload {} ({} bytes)", key, body.len());

    Ok(Json(UploadReceipt {
        file_key: key,
        size_bytes: body.len(),
        sha256,
    }))
}
