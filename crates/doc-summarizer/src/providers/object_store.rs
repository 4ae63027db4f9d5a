//! Object store provider trait for uploaded files

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// A pre-signed upload target handed to the client
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUpload {
    /// URL the client uploads the file to
    pub url: String,
    /// HTTP method to use (always "PUT" for now)
    pub method: String,
    /// Headers the client must send with the upload
    pub headers: HashMap<String, String>,
    /// When the URL stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Trait for object storage
///
/// Implementations:
/// - `LocalObjectStore`: Local filesystem, uploads served by this process
/// - `GcsObjectStore`: Google Cloud Storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue a time-limited URL the client can upload `key` to
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<PresignedUpload>;

    /// Canonical URL recorded for an object (what the worker downloads)
    fn object_url(&self, key: &str) -> String;

    /// Inverse of `object_url`; `None` if the URL is not served by this store
    fn key_for_url(&self, url: &str) -> Option<String>;

    /// Store an object
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Retrieve object data
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Object size in bytes, `None` if it does not exist
    async fn head_object(&self, key: &str) -> Result<Option<u64>>;

    /// Delete an object (missing objects are not an error)
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
