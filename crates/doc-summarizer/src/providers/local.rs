//! Local object store using the filesystem
//!
//! Upload URLs point back at this service (`PUT /api/uploads/{key}`) and carry
//! an HMAC-SHA256 signature over the method, key and expiry.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

use super::object_store::{ObjectStore, PresignedUpload};

const URL_SCHEME: &str = "local://";

/// Generate a random hex-encoded signing secret
pub fn generate_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| Error::internal("Failed to generate signing secret"))?;
    Ok(hex::encode(bytes))
}

/// Local object store with self-served pre-signed uploads
pub struct LocalObjectStore {
    /// Directory objects are stored under
    root: PathBuf,
    /// Public base URL of this service
    base_url: String,
    /// Upload URL signing key
    signing_key: hmac::Key,
}

impl LocalObjectStore {
    /// Create a new local object store
    pub fn new(root: PathBuf, base_url: impl Into<String>, secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("Local object store requires a signing secret".to_string()));
        }
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signing_key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        })
    }

    /// Hex signature for an upload of `key` valid until `expires` (unix seconds)
    pub fn sign_upload(&self, key: &str, expires: i64) -> String {
        let tag = hmac::sign(&self.signing_key, signing_payload(key, expires).as_bytes());
        hex::encode(tag.as_ref())
    }

    /// Check an upload signature and its expiry
    pub fn verify_upload(&self, key: &str, expires: i64, signature: &str) -> Result<()> {
        if Utc::now().timestamp() > expires {
            return Err(Error::Unauthorized("Upload URL has expired".to_string()));
        }

        let tag = hex::decode(signature)
            .map_err(|_| Error::Unauthorized("Malformed upload signature".to_string()))?;

        hmac::verify(&self.signing_key, signing_payload(key, expires).as_bytes(), &tag)
            .map_err(|_| Error::Unauthorized("Invalid upload signature".to_string()))
    }

    /// Resolve a key to a path under the root, rejecting traversal
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn signing_payload(key: &str, expires: i64) -> String {
    format!("PUT\n{}\n{}", key, expires)
}

/// Keys are relative, slash-separated and free of `.`/`..` segments
fn validate_key(key: &str) -> Result<()> {
    let invalid = key.is_empty()
        || key.contains('\\')
        || key.split('/').any(|s| s.is_empty() || s == "." || s == "..")
        || Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

    if invalid {
        return Err(Error::InvalidRequest(format!("Invalid object key: {}", key)));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<PresignedUpload> {
        validate_key(key)?;

        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.sign_upload(key, expires);
        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or_else(|| Error::internal("Upload expiry out of range"))?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());

        Ok(PresignedUpload {
            url: format!(
                "{}/api/uploads/{}?expires={}&signature={}",
                self.base_url, key, expires, signature
            ),
            method: "PUT".to_string(),
            headers,
            expires_at,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}{}", URL_SCHEME, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(URL_SCHEME)
            .filter(|key| validate_key(key).is_ok())
            .map(|key| key.to_string())
    }

    async fn put_object(&self, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Readers never observe a partially written file
        let partial = path.with_extension("part");
        tokio::fs::write(&partial, data).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!("Stored object {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("Object {}", key)),
            _ => Error::storage(format!("Failed to read object {}: {}", key, e)),
        })
    }

    async fn head_object(&self, key: &str) -> Result<Option<u64>> {
        let path = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(format!("Failed to stat object {}: {}", key, e))),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(format!("Failed to delete object {}: {}", key, e))),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.root.is_dir())
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalObjectStore {
        LocalObjectStore::new(dir.path().join("objects"), "http://localhost:8080/", "secret").unwrap()
    }

    #[test]
    fn test_generate_secret() {
        let a = generate_secret().unwrap();
        let b = generate_secret().unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_traversal_keys() {
        assert!(validate_key("uploads/u/1/report.pdf").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("uploads//report.pdf").is_err());
        assert!(validate_key("uploads\\report.pdf").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn test_signature_verification() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let expires = Utc::now().timestamp() + 60;
        let signature = store.sign_upload("uploads/a.pdf", expires);

        assert!(store.verify_upload("uploads/a.pdf", expires, &signature).is_ok());
        assert!(store.verify_upload("uploads/b.pdf", expires, &signature).is_err());
        assert!(store.verify_upload("uploads/a.pdf", expires + 1, &signature).is_err());
        assert!(store.verify_upload("uploads/a.pdf", expires, "zz").is_err());

        let past = Utc::now().timestamp() - 1;
        let stale = store.sign_upload("uploads/a.pdf", past);
        assert!(matches!(
            store.verify_upload("uploads/a.pdf", past, &stale),
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_presign_upload_url() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let upload = store
            .presign_upload("uploads/u/1/a.pdf", "application/pdf", Duration::from_secs(300))
            .await
            .unwrap();

        assert!(upload.url.starts_with("http://localhost:8080/api/uploads/uploads/u/1/a.pdf?expires="));
        assert!(upload.url.contains("&signature="));
        assert_eq!(upload.method, "PUT");
        assert_eq!(upload.headers.get("Content-Type").unwrap(), "application/pdf");
        assert!(upload.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_object_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let key = "uploads/u/1/a.pdf";

        assert_eq!(store.head_object(key).await.unwrap(), None);

        store.put_object(key, b"%PDF-1.4 test", "application/pdf").await.unwrap();
        assert_eq!(store.head_object(key).await.unwrap(), Some(13));
        assert_eq!(store.get_object(key).await.unwrap(), b"%PDF-1.4 test");

        store.delete_object(key).await.unwrap();
        store.delete_object(key).await.unwrap();
        assert!(matches!(store.get_object(key).await, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_url_mapping() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let url = store.object_url("uploads/u/1/a.pdf");
        assert_eq!(url, "local://uploads/u/1/a.pdf");
        assert_eq!(store.key_for_url(&url).as_deref(), Some("uploads/u/1/a.pdf"));
        assert_eq!(store.key_for_url("https://example.com/a.pdf"), None);
        assert_eq!(store.key_for_url("local://../secret"), None);
    }
}
