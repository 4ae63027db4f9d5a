//! Download of uploaded files for processing

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::ObjectStore;

/// Fetches a job's `file_url`
///
/// URLs owned by the configured object store are read through it; plain
/// `http(s)` URLs are downloaded with reqwest.
pub struct FileFetcher {
    store: Arc<dyn ObjectStore>,
    client: reqwest::Client,
    max_bytes: usize,
}

impl FileFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            store,
            client,
            max_bytes,
        })
    }

    /// Fetch the file's bytes
    pub async fn fetch(&self, file_url: &str) -> Result<Vec<u8>> {
        if let Some(key) = self.store.key_for_url(file_url) {
            tracing::debug!("Reading {} from {}", key, self.store.name());
            let data = self.store.get_object(&key).await?;
            self.check_size(data.len())?;
            return Ok(data);
        }

        if file_url.starts_with("http://") || file_url.starts_with("https://") {
            return self.download(file_url).await;
        }

        Err(Error::InvalidRequest(format!("Unsupported file URL: {}", file_url)))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("Downloading {}", url);
        let mut response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::storage(format!(
                "Download of {} failed with status {}",
                url,
                response.status()
            )));
        }

        if let Some(len) = response.content_length() {
            self.check_size(len as usize)?;
        }

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            self.check_size(data.len())?;
        }

        Ok(data)
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_bytes {
            return Err(Error::PayloadTooLarge(format!(
                "File is {} bytes, limit is {}",
                len, self.max_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalObjectStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(dir: &tempfile::TempDir, max_bytes: usize) -> (FileFetcher, Arc<LocalObjectStore>) {
        let store = Arc::new(
            LocalObjectStore::new(dir.path().to_path_buf(), "http://localhost:8080", "secret")
                .unwrap(),
        );
        let fetcher = FileFetcher::new(store.clone(), Duration::from_secs(5), max_bytes).unwrap();
        (fetcher, store)
    }

    #[tokio::test]
    async fn test_fetch_from_object_store() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, store) = fetcher(&dir, 1024);
        store
            .put_object("uploads/u/1/a.pdf", b"%PDF-1.4", "application/pdf")
            .await
            .unwrap();

        let data = fetcher.fetch(&store.object_url("uploads/u/1/a.pdf")).await.unwrap();
        assert_eq!(data, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, store) = fetcher(&dir, 4);
        store
            .put_object("uploads/u/1/a.pdf", b"%PDF-1.4", "application/pdf")
            .await
            .unwrap();

        let result = fetcher.fetch(&store.object_url("uploads/u/1/a.pdf")).await;
        assert!(matches!(result, Err(Error::PayloadTooLarge(_))));
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, store) = fetcher(&dir, 1024);

        let result = fetcher.fetch(&store.object_url("uploads/u/1/missing.pdf")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, _) = fetcher(&dir, 1024);

        let result = fetcher.fetch("ftp://example.com/a.pdf").await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_http_download() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, _) = fetcher(&dir, 1024);
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files/a.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 remote".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let data = fetcher
            .fetch(&format!("{}/files/a.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(data, b"%PDF-1.7 remote");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, _) = fetcher(&dir, 1024);
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files/gone.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher.fetch(&format!("{}/files/gone.pdf", server.uri())).await;
        match result {
            Err(Error::Storage(message)) => assert!(message.contains("404")),
            other => panic!("expected Storage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_declared_length_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, _) = fetcher(&dir, 1024);
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files/big.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
            .mount(&server)
            .await;

        let result = fetcher.fetch(&format!("{}/files/big.pdf", server.uri())).await;
        assert!(matches!(result, Err(Error::PayloadTooLarge(_))));
    }

    #[tokio::test]
    async fn test_http_streamed_body_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (fetcher, _) = fetcher(&dir, 1024);

        // No Content-Length: the body runs until the connection closes
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;

            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            for _ in 0..8 {
                if socket.write_all(&[b'x'; 512]).await.is_err() {
                    break;
                }
            }
            let _ = socket.shutdown().await;
        });

        let result = fetcher.fetch(&format!("http://{}/stream.pdf", address)).await;
        assert!(matches!(result, Err(Error::PayloadTooLarge(_))));
        server.abort();
    }
}
