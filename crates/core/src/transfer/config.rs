//! Configuration for downloads and the artifact store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Download limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Whole-request timeout for one download.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Downloads larger than this are aborted.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

fn default_download_timeout() -> u64 {
    120
}

fn default_max_download_bytes() -> u64 {
    100 * 1024 * 1024
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

impl TransferConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Where finished artifacts are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadBackend {
    /// S3-compatible object storage (AWS S3, Cloudflare R2, MinIO).
    S3,
    /// A local directory, typically served by a static file server.
    Filesystem,
}

/// Artifact store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub backend: UploadBackend,

    /// S3 API endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing)]
    pub secret_key: Option<String>,

    #[serde(default)]
    pub bucket: String,

    /// Usually "auto" for R2.
    #[serde(default = "default_region")]
    pub region: String,

    /// Public URL prefix for returned references. When unset, S3 references
    /// are `<endpoint>/<bucket>/<object>` and filesystem references are the
    /// published path.
    #[serde(default)]
    pub public_base: Option<String>,

    /// Target directory for the filesystem backend.
    #[serde(default)]
    pub publish_dir: Option<PathBuf>,
}

fn default_region() -> String {
    "auto".to_string()
}

impl UploadConfig {
    /// Check that the fields required by the selected backend are present.
    pub fn check(&self) -> Result<(), String> {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        match self.backend {
            UploadBackend::S3 => {
                if !present(&self.endpoint) {
                    return Err("endpoint is required for the s3 backend".to_string());
                }
                if !present(&self.access_key) || !present(&self.secret_key) {
                    return Err("access_key and secret_key are required for the s3 backend"
                        .to_string());
                }
                if self.bucket.trim().is_empty() {
                    return Err("bucket is required for the s3 backend".to_string());
                }
            }
            UploadBackend::Filesystem => {
                if self.publish_dir.is_none() {
                    return Err("publish_dir is required for the filesystem backend".to_string());
                }
            }
        }
        Ok(())
    }
}
