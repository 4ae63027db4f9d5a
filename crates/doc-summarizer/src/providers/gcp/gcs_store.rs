//! Google Cloud Storage object store
//!
//! Clients upload directly to GCS through V4 signed PUT URLs; the worker
//! downloads through the authenticated client.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client as GcsClient, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::sign::{SignedURLMethod, SignedURLOptions};

use crate::error::{Error, Result};
use crate::providers::object_store::{ObjectStore, PresignedUpload};

/// Google Cloud Storage object store
pub struct GcsObjectStore {
    client: GcsClient,
    bucket: String,
    prefix: String,
}

impl GcsObjectStore {
    /// Create a new GCS object store
    ///
    /// # Arguments
    /// * `key_path` - Service account JSON key (also used to sign URLs)
    /// * `bucket` - GCS bucket name
    /// * `prefix` - Object name prefix (may be empty)
    pub async fn new(key_path: &Path, bucket: String, prefix: String) -> Result<Self> {
        if bucket.is_empty() {
            return Err(Error::Config("gcp.gcs_bucket is required for GCS storage".to_string()));
        }

        let credentials = CredentialsFile::new_from_file(key_path.to_string_lossy().to_string())
            .await
            .map_err(|e| Error::Config(format!("Failed to load GCS credentials: {}", e)))?;

        let config = ClientConfig::default()
            .with_credentials(credentials)
            .await
            .map_err(|e| Error::Config(format!("Failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: GcsClient::new(config),
            bucket,
            prefix,
        })
    }

    /// Full object name for a key
    fn object_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn get_request(&self, key: &str) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            object: self.object_name(key),
            ..Default::default()
        }
    }
}

fn is_not_found(err: &google_cloud_storage::http::Error) -> bool {
    matches!(err, google_cloud_storage::http::Error::Response(r) if r.code == 404)
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<PresignedUpload> {
        let options = SignedURLOptions {
            method: SignedURLMethod::PUT,
            expires: ttl,
            content_type: Some(content_type.to_string()),
            ..Default::default()
        };

        let url = self
            .client
            .signed_url(&self.bucket, &self.object_name(key), None, None, options)
            .await
            .map_err(|e| Error::storage(format!("Failed to sign GCS upload URL: {}", e)))?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());

        Ok(PresignedUpload {
            url,
            method: "PUT".to_string(),
            headers,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket, self.object_name(key))
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix("gs://")?
            .strip_prefix(self.bucket.as_str())?
            .strip_prefix('/')?
            .strip_prefix(self.prefix.as_str())
            .filter(|key| !key.is_empty())
            .map(|key| key.to_string())
    }

    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let mut media = Media::new(self.object_name(key));
        media.content_type = content_type.to_string().into();

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data.to_vec(),
                &UploadType::Simple(media),
            )
            .await
            .map_err(|e| Error::storage(format!("Failed to upload to GCS: {}", e)))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.client
            .download_object(&self.get_request(key), &Range::default())
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    Error::NotFound(format!("Object {}", key))
                } else {
                    Error::storage(format!("Failed to download from GCS: {}", e))
                }
            })
    }

    async fn head_object(&self, key: &str) -> Result<Option<u64>> {
        match self.client.get_object(&self.get_request(key)).await {
            Ok(object) => Ok(Some(object.size.max(0) as u64)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::storage(format!("Failed to stat GCS object: {}", e))),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let request = DeleteObjectRequest {
            bucket: self.bucket.clone(),
            object: self.object_name(key),
            ..Default::default()
        };

        match self.client.delete_object(&request).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::storage(format!("Failed to delete GCS object: {}", e))),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        // Try to list objects (with limit 1) to check bucket access
        let list_request = ListObjectsRequest {
            bucket: self.bucket.clone(),
            max_results: Some(1),
            ..Default::default()
        };

        self.client
            .list_objects(&list_request)
            .await
            .map(|_| true)
            .map_err(|e| Error::storage(format!("GCS health check failed: {}", e)))
    }

    fn name(&self) -> &str {
        "gcs"
    }
}
