//! API routes for the summarization server

pub mod documents;
pub mod jobs;
pub mod uploads;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::request::Parts,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::Error;
use crate::server::state::AppState;

/// Header carrying the caller's identity
pub const USER_ID_HEADER: &str = "x-user-id";

const MAX_USER_ID_LEN: usize = 128;

/// Caller identity taken from the `x-user-id` header
///
/// Authentication happens in front of this service; the header is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?;

        if value.len() > MAX_USER_ID_LEN {
            return Err(Error::InvalidRequest(format!(
                "{} header exceeds {} characters",
                USER_ID_HEADER, MAX_USER_ID_LEN
            )));
        }

        Ok(UserId(value.to_string()))
    }
}

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    // Upload bodies are capped at the upload limit instead of axum's default
    let upload_target = Router::new()
        .route("/uploads/*key", put(uploads::receive_upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size));

    Router::new()
        // Uploads
        .route("/uploads", post(uploads::create_upload))
        .merge(upload_target)
        // Documents
        .route("/documents", get(documents::list_documents))
        .route("/documents/:id", delete(documents::delete_document))
        .route("/documents/:id/complete", post(documents::complete_upload))
        .route("/documents/:id/status", get(documents::document_status))
        .route("/documents/:id/summary", get(documents::get_summary))
        .route("/documents/:id/retry", post(documents::retry_document))
        // Jobs
        .route("/jobs/stats", get(jobs::job_stats))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "doc-summarizer",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "PDF upload service with background LLM summaries",
        "endpoints": {
            "POST /api/uploads": "Register a PDF and get a pre-signed upload URL",
            "PUT /api/uploads/*key": "Signed upload target (local storage only)",
            "POST /api/documents/:id/complete": "Confirm the upload and queue summarization",
            "GET /api/documents/:id/status": "Poll document, job and summary state",
            "GET /api/documents/:id/summary": "Get the finished summary",
            "POST /api/documents/:id/retry": "Re-queue a failed document",
            "GET /api/documents": "List your documents",
            "DELETE /api/documents/:id": "Delete a document and its file",
            "GET /api/jobs/stats": "Queue statistics"
        },
        "identity_header": USER_ID_HEADER
    }))
}
