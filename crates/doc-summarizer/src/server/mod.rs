//! HTTP server for the summarization service

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SummarizerConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Summarization HTTP server
pub struct SummarizerServer {
    config: SummarizerConfig,
    state: AppState,
}

impl SummarizerServer {
    /// Create a new server, connecting all configured backends
    pub async fn new(config: SummarizerConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Shared application state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting summarization server on http://{}", addr);
        tracing::info!("API info: {}/api/info", self.config.public_url());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over the given state
pub fn router(state: AppState) -> Router {
    let max_upload_size = state.config().server.max_upload_size;

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .nest("/api", routes::api_routes(max_upload_size))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if state.config().server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint: database, object store and LLM must respond
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = state.database().health_check().is_ok();
    let object_store = matches!(state.object_store().health_check().await, Ok(true));
    let llm = matches!(state.summarizer().provider().health_check().await, Ok(true));

    let ready = database && object_store && llm;
    if !ready {
        tracing::warn!(
            "Not ready: database={}, object_store={}, llm={}",
            database,
            object_store,
            llm
        );
    }

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "ready": ready,
            "checks": {
                "database": database,
                "object_store": object_store,
                "llm": llm,
            }
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ExtractedText, TextExtractor};
    use crate::processing::ChannelBroker;
    use crate::providers::{LocalObjectStore, SummaryProvider};
    use crate::storage::Database;
    use crate::types::DocumentStatus;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BASE_URL: &str = "http://localhost:8080";

    struct EchoExtractor;

    impl TextExtractor for EchoExtractor {
        fn extract(&self, _filename: &str, data: &[u8]) -> crate::Result<ExtractedText> {
            Ok(ExtractedText {
                text: String::from_utf8_lossy(data).to_string(),
                page_count: Some(1),
            })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct StaticProvider;

    #[async_trait]
    impl SummaryProvider for StaticProvider {
        async fn summarize(&self, _prompt: &str) -> crate::Result<String> {
            Ok("The document describes a test.".to_string())
        }

        async fn health_check(&self) -> crate::Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "static"
        }

        fn model(&self) -> &str {
            "static-1"
        }
    }

    struct TestApp {
        _dir: tempfile::TempDir,
        state: AppState,
        router: Router,
    }

    fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SummarizerConfig::default();
        config.storage.signing_secret = "test-secret".to_string();
        config.server.max_upload_size = 1024;

        let local = Arc::new(
            LocalObjectStore::new(dir.path().to_path_buf(), BASE_URL, "test-secret").unwrap(),
        );
        let state = AppState::from_parts(
            config,
            state::Backends {
                database: Arc::new(Database::in_memory().unwrap()),
                object_store: local.clone(),
                local_store: Some(local),
                broker: Arc::new(ChannelBroker::new(10)),
                provider: Arc::new(StaticProvider),
                extractor: Arc::new(EchoExtractor),
            },
        )
        .unwrap();

        TestApp {
            _dir: dir,
            router: router(state.clone()),
            state,
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: Method, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(routes::USER_ID_HEADER, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, user: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(routes::USER_ID_HEADER, user)
            .body(Body::empty())
            .unwrap()
    }

    fn put_file(path: &str, content: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::PUT)
            .uri(path)
            .header("content-type", "application/pdf")
            .body(content.into())
            .unwrap()
    }

    /// Register an upload; returns the document ID and the signed upload path
    async fn register(app: &TestApp, user: &str) -> (Uuid, String) {
        let (status, body) = send(
            app,
            json_request(
                Method::POST,
                "/api/uploads",
                Some(user),
                json!({"filename": "report.pdf"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["method"], "PUT");
        assert_eq!(body["headers"]["Content-Type"], "application/pdf");

        let upload_url = body["upload_url"].as_str().unwrap();
        let path = upload_url.strip_prefix(BASE_URL).unwrap().to_string();
        (body["document_id"].as_str().unwrap().parse().unwrap(), path)
    }

    /// Register an upload and PUT the file; returns the document ID
    async fn upload(app: &TestApp, user: &str, content: &'static str) -> Uuid {
        let (id, path) = register(app, user).await;
        let (status, receipt) = send(app, put_file(&path, content)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["size_bytes"], content.len());
        id
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let app = app();
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/uploads", None, json!({"filename": "a.pdf"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "unauthorized");
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_and_oversized() {
        let app = app();
        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/uploads",
                Some("alice"),
                json!({"filename": "notes.docx"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/uploads",
                Some("alice"),
                json!({"filename": "big.pdf", "size_bytes": 4096}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let app = app();
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/api/uploads/uploads/alice/x/report.pdf?expires=9999999999&signature=00")
            .body(Body::from("%PDF-1.4"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_body_over_limit_is_rejected() {
        let app = app();
        let (_, path) = register(&app, "alice").await;

        let response = app
            .router
            .clone()
            .oneshot(put_file(&path, vec![b'x'; 2048]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_upload_url_is_frozen_after_complete() {
        let app = app();
        let (id, path) = register(&app, "alice").await;
        let (status, _) = send(&app, put_file(&path, "first version")).await;
        assert_eq!(status, StatusCode::OK);

        // Replacing the file before completion is allowed
        let (status, _) = send(&app, put_file(&path, "second version")).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/documents/{}/complete", id);
        let (status, _) = send(&app, json_request(Method::POST, &uri, Some("alice"), json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, _) = send(&app, put_file(&path, "swapped after queueing")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let doc = app.state.database().get_document(&id).unwrap().unwrap();
        let stored = app
            .state
            .object_store()
            .get_object(&doc.file_key)
            .await
            .unwrap();
        assert_eq!(stored, b"second version".to_vec());
    }

    #[tokio::test]
    async fn test_complete_before_upload_conflicts() {
        let app = app();
        let (_, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/uploads",
                Some("alice"),
                json!({"filename": "report.pdf"}),
            ),
        )
        .await;
        let id = body["document_id"].as_str().unwrap();

        let uri = format!("/api/documents/{}/complete", id);
        let (status, _) = send(&app, json_request(Method::POST, &uri, Some("alice"), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_upload_to_summary_flow() {
        let app = app();
        let id = upload(&app, "alice", "Quarterly revenue grew.").await;

        let uri = format!("/api/documents/{}/complete", id);
        let (status, body) =
            send(&app, json_request(Method::POST, &uri, Some("alice"), json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "queued");

        // Completing twice is a conflict
        let (status, _) = send(&app, json_request(Method::POST, &uri, Some("alice"), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let status_uri = format!("/api/documents/{}/status", id);
        let (_, body) = send(&app, get(&status_uri, "alice")).await;
        assert_eq!(body["status"], "queued");
        assert_eq!(body["job"]["stage"], "queued");

        let summary_uri = format!("/api/documents/{}/summary", id);
        let (status, _) = send(&app, get(&summary_uri, "alice")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = app.state.start_worker(shutdown_rx).await.unwrap();

        assert!(wait_for_status(&app, &id, DocumentStatus::Completed).await);

        let (status, body) = send(&app, get(&status_uri, "alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["job"]["status"], "complete");
        assert_eq!(body["summary"]["content"], "The document describes a test.");

        let (status, body) = send(&app, get(&summary_uri, "alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "static-1");

        let (_, body) = send(&app, get("/api/jobs/stats", "alice")).await;
        assert_eq!(body["jobs"]["complete"], 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(10), worker)
            .await
            .unwrap()
            .unwrap();
    }

    async fn wait_for_status(app: &TestApp, id: &Uuid, status: DocumentStatus) -> bool {
        for _ in 0..250 {
            let doc = app.state.database().get_document(id).unwrap().unwrap();
            if doc.status == status {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_start_worker_resumes_interrupted_job_first() {
        let app = app();
        let id = upload(&app, "alice", "Interrupted text.").await;
        let uri = format!("/api/documents/{}/complete", id);
        let (status, _) = send(&app, json_request(Method::POST, &uri, Some("alice"), json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        // A previous worker popped the message and died mid-job
        let queue = app.state.job_queue();
        let message = queue.broker().pop(Duration::from_millis(10)).await.unwrap().unwrap();
        let mut job = app.state.database().get_job(&message.job_id).unwrap().unwrap();
        queue.mark_processing(&mut job).unwrap();
        assert_eq!(queue.broker().len().await.unwrap(), 0);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = app.state.start_worker(shutdown_rx).await.unwrap();
        assert!(wait_for_status(&app, &id, DocumentStatus::Completed).await);

        let stored = app.state.database().get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(app.state.database().job_counts().unwrap().complete, 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(10), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_documents_are_scoped_to_user() {
        let app = app();
        let id = upload(&app, "alice", "text").await;
        upload(&app, "alice", "more text").await;

        let (_, body) = send(&app, get("/api/documents", "alice")).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["documents"].as_array().unwrap().len(), 2);

        let (_, body) = send(&app, get("/api/documents", "bob")).await;
        assert_eq!(body["total"], 0);

        let uri = format!("/api/documents/{}/status", id);
        let (status, _) = send(&app, get(&uri, "bob")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_retry_requires_failed_document() {
        let app = app();
        let id = upload(&app, "alice", "text").await;

        let uri = format!("/api/documents/{}/retry", id);
        let (status, _) = send(&app, json_request(Method::POST, &uri, Some("alice"), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        app.state
            .database()
            .update_document_status(&id, DocumentStatus::Failed, Some("boom"))
            .unwrap();
        let (status, body) =
            send(&app, json_request(Method::POST, &uri, Some("alice"), json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "queued");
    }

    #[tokio::test]
    async fn test_delete_document() {
        let app = app();
        let id = upload(&app, "alice", "text").await;
        let document = app.state.database().get_document(&id).unwrap().unwrap();

        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/documents/{}", id))
            .header(routes::USER_ID_HEADER, "alice")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        assert!(app.state.database().get_document(&id).unwrap().is_none());
        assert!(app
            .state
            .object_store()
            .head_object(&document.file_key)
            .await
            .unwrap()
            .is_none());
    }
}
