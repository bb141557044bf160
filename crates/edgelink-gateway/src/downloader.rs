//! URL based firmware file downloader.
//!
//! Supported locations:
//! - `http://` and `https://` (requires the `http` feature): streamed into
//!   the download directory
//! - `file://` URLs and bare paths: used in place, must exist

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::DownloadError;
use crate::firmware::FileDownloader;
use edgelink_core::FirmwareConfig;

/// File name used when the URL path does not end in one.
const DEFAULT_FILE_NAME: &str = "firmware.bin";

/// Downloads firmware files referenced by URL.
pub struct UrlFileDownloader {
    download_dir: PathBuf,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl UrlFileDownloader {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            #[cfg(feature = "http")]
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &FirmwareConfig) -> Self {
        Self::new(config.download_dir.clone())
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    async fn resolve_local(&self, path: &str) -> Result<PathBuf, DownloadError> {
        if path.is_empty() {
            return Err(DownloadError::FileDoesNotExist("empty path".to_string()));
        }

        let path = PathBuf::from(path);
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(DownloadError::FileDoesNotExist(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(path)
    }

    #[cfg(feature = "http")]
    async fn fetch(&self, url: &str) -> Result<PathBuf, DownloadError> {
        use futures::StreamExt as _;
        use tokio::io::AsyncWriteExt as _;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Unspecified(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DownloadError::FileDoesNotExist(url.to_string()));
        }
        if !status.is_success() {
            return Err(DownloadError::Unspecified(format!(
                "{} returned status {}",
                url,
                status.as_u16()
            )));
        }

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| DownloadError::Unspecified(e.to_string()))?;
        let target = self.download_dir.join(file_name_from_url(url));
        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|e| DownloadError::Unspecified(e.to_string()))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Unspecified(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::Unspecified(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| DownloadError::Unspecified(e.to_string()))?;

        tracing::debug!("Downloaded {} to {}", url, target.display());
        Ok(target)
    }

    #[cfg(not(feature = "http"))]
    async fn fetch(&self, url: &str) -> Result<PathBuf, DownloadError> {
        Err(DownloadError::Unspecified(format!(
            "HTTP support is disabled, cannot download {}",
            url
        )))
    }
}

#[async_trait]
impl FileDownloader for UrlFileDownloader {
    async fn download(&self, url: &str) -> Result<PathBuf, DownloadError> {
        let url = url.trim();

        if let Some(path) = url.strip_prefix("file://") {
            return self.resolve_local(path).await;
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch(url).await;
        }
        if url.contains("://") {
            return Err(DownloadError::Unspecified(format!(
                "Unsupported URL scheme: {}",
                url
            )));
        }

        self.resolve_local(url).await
    }
}

/// Last path segment of a URL, ignoring query and fragment.
fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    match path.split_once('/') {
        Some((_, path)) => path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string(),
        None => DEFAULT_FILE_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("http://x/fw.bin"), "fw.bin");
        assert_eq!(
            file_name_from_url("https://cdn.example.com/a/b/fw-1.2.img?token=abc"),
            "fw-1.2.img"
        );
        assert_eq!(file_name_from_url("http://x/"), DEFAULT_FILE_NAME);
        assert_eq!(file_name_from_url("http://x"), DEFAULT_FILE_NAME);
    }

    #[tokio::test]
    async fn test_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fw.bin");
        std::fs::write(&file, b"firmware").unwrap();

        let downloader = UrlFileDownloader::new(dir.path());

        let path = downloader.download(file.to_str().unwrap()).await.unwrap();
        assert_eq!(path, file);

        let url = format!("file://{}", file.display());
        assert_eq!(downloader.download(&url).await.unwrap(), file);
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = UrlFileDownloader::new(dir.path());

        let missing = dir.path().join("missing.bin");
        let err = downloader
            .download(missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::FileDoesNotExist(_)));

        let err = downloader
            .download(dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::FileDoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let downloader = UrlFileDownloader::new(std::env::temp_dir());

        let err = downloader.download("ftp://x/fw.bin").await.unwrap_err();
        assert!(matches!(err, DownloadError::Unspecified(_)));
    }
}
