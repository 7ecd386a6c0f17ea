//! Streaming download of remote inputs.

use futures::StreamExt;
use reqwest::{Client, Url};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::config::TransferConfig;
use super::error::TransferError;
use crate::metrics;

/// Fetches inputs into the job's working directory.
///
/// Bodies are streamed chunk by chunk to disk, so memory use does not grow
/// with the size of the input.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    max_bytes: u64,
}

impl Downloader {
    pub fn new(config: &TransferConfig) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(config.download_timeout())
            .build()
            .map_err(|e| TransferError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            max_bytes: config.max_download_bytes,
        })
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// `file://` URLs are copied from the local filesystem. On failure any
    /// partial file is removed.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, TransferError> {
        let result = self.fetch(url, dest).await;

        match &result {
            Ok(bytes) => {
                metrics::TRANSFERS_TOTAL
                    .with_label_values(&["download", "success"])
                    .inc();
                metrics::TRANSFER_BYTES
                    .with_label_values(&["download"])
                    .inc_by(*bytes);
                debug!(url = %url, dest = %dest.display(), bytes, "Download complete");
            }
            Err(e) => {
                metrics::TRANSFERS_TOTAL
                    .with_label_values(&["download", "failed"])
                    .inc();
                warn!(url = %url, error = %e, "Download failed");
                if let Err(rm) = tokio::fs::remove_file(dest).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(dest = %dest.display(), error = %rm, "Failed to remove partial download");
                    }
                }
            }
        }

        result
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransferError> {
        let parsed = Url::parse(url).map_err(|e| TransferError::download_failed(url, e))?;

        if parsed.scheme() == "file" {
            let source = parsed
                .to_file_path()
                .map_err(|_| TransferError::download_failed(url, "invalid file url"))?;
            return self.copy_local(url, &source, dest).await;
        }

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransferError::download_failed(
                url,
                format!("unsupported scheme: {}", parsed.scheme()),
            ));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TransferError::download_failed(url, e))?;

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(self.too_large(url));
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| TransferError::download_failed(url, e))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let data = chunk.map_err(|e| TransferError::download_failed(url, e))?;
            written += data.len() as u64;
            if written > self.max_bytes {
                return Err(self.too_large(url));
            }
            file.write_all(&data)
                .await
                .map_err(|e| TransferError::download_failed(url, e))?;
        }

        file.flush()
            .await
            .map_err(|e| TransferError::download_failed(url, e))?;

        Ok(written)
    }

    async fn copy_local(&self, url: &str, source: &Path, dest: &Path) -> Result<u64, TransferError> {
        let meta = tokio::fs::metadata(source)
            .await
            .map_err(|e| TransferError::download_failed(url, e))?;
        if meta.len() > self.max_bytes {
            return Err(self.too_large(url));
        }

        tokio::fs::copy(source, dest)
            .await
            .map_err(|e| TransferError::download_failed(url, e))
    }

    fn too_large(&self, url: &str) -> TransferError {
        TransferError::download_failed(
            url,
            format!("response exceeds the {} byte limit", self.max_bytes),
        )
    }
}
