//! Artifact download
//!
//! Streams an HTTP(S) response body chunk by chunk into a file. The write is
//! only reported as successful after the file has been flushed and synced.

use crate::config::FetchConfig;
use futures::StreamExt;
use reqwest::Client;
use sift_common::{Result, SiftError};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// HTTP client for downloading artifacts
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: Client,
}

impl ArtifactFetcher {
    /// Create a new fetcher with the configured timeouts
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| SiftError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Download `url` into `dest`, returning the number of bytes written
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(url = url, dest = %dest.display(), "fetching artifact");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SiftError::fetch(url, describe(&e)))?
            .error_for_status()
            .map_err(|e| SiftError::fetch(url, describe(&e)))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| SiftError::fetch(url, format!("cannot create {}: {}", dest.display(), e)))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SiftError::fetch(url, describe(&e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SiftError::fetch(url, format!("write failed: {}", e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| SiftError::fetch(url, format!("flush failed: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| SiftError::fetch(url, format!("sync failed: {}", e)))?;

        debug!(url = url, bytes = written, "artifact fetched");
        Ok(written)
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {}", err)
    } else if let Some(status) = err.status() {
        format!("server responded with {}", status)
    } else {
        err.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> ArtifactFetcher {
        ArtifactFetcher::new(&FetchConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
            user_agent: "sift-test".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifact.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a.tar.gz");
        let url = format!("{}/artifact.tar.gz", server.uri());

        let written = fetcher().fetch_to_file(&url, &dest).await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let url = format!("{}/missing.tar.gz", server.uri());

        let err = fetcher()
            .fetch_to_file(&url, &dir.path().join("a.tar.gz"))
            .await
            .unwrap_err();

        match err {
            SiftError::Fetch { url: failed, reason } => {
                assert_eq!(failed, url);
                assert!(reason.contains("404"), "{reason}");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let fetcher = ArtifactFetcher::new(&FetchConfig {
            timeout_secs: 1,
            connect_timeout_secs: 1,
            user_agent: "sift-test".to_string(),
        })
        .unwrap();
        let dir = TempDir::new().unwrap();

        let err = fetcher
            .fetch_to_file(&server.uri(), &dir.path().join("a.tar.gz"))
            .await
            .unwrap_err();

        assert!(matches!(err, SiftError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let err = fetcher()
            .fetch_to_file("http://127.0.0.1:9/nothing.tar.gz", &dir.path().join("a.tar.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, SiftError::Fetch { .. }));
    }
}
