//! Artifact stores: where finished outputs are published.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::config::{UploadBackend, UploadConfig};
use super::error::TransferError;
use crate::metrics;

/// Publishes a local artifact and returns a reference to it.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload `local` as `object_name`, returning the public reference.
    async fn upload(&self, local: &Path, object_name: &str) -> Result<String, TransferError>;

    /// Backend name for logs and the health report.
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Build the store selected by configuration. `None` yields a store that
/// refuses every upload.
pub fn create_artifact_store(
    config: Option<&UploadConfig>,
) -> Result<Arc<dyn ArtifactStore>, TransferError> {
    match config {
        None => Ok(Arc::new(UnconfiguredStore)),
        Some(config) => {
            config.check().map_err(TransferError::ClientSetup)?;
            match config.backend {
                UploadBackend::S3 => Ok(Arc::new(S3ArtifactStore::new(config)?)),
                UploadBackend::Filesystem => Ok(Arc::new(FsArtifactStore::new(config)?)),
            }
        }
    }
}

fn join_reference(base: &str, object_name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), object_name)
}

fn record_upload(result: &Result<String, TransferError>, bytes: u64) {
    let label = if result.is_ok() { "success" } else { "failed" };
    metrics::TRANSFERS_TOTAL
        .with_label_values(&["upload", label])
        .inc();
    if result.is_ok() {
        metrics::TRANSFER_BYTES
            .with_label_values(&["upload"])
            .inc_by(bytes);
    }
}

async fn file_len(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

/// S3-compatible object storage (AWS S3, Cloudflare R2, MinIO).
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    reference_base: String,
}

impl S3ArtifactStore {
    pub fn new(config: &UploadConfig) -> Result<Self, TransferError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| TransferError::ClientSetup("s3 endpoint missing".to_string()))?;

        let credentials = Credentials::new(
            config.access_key.clone().unwrap_or_default(),
            config.secret_key.clone().unwrap_or_default(),
            None,
            None,
            "reelwork",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let reference_base = match &config.public_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket),
        };

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
            reference_base,
        })
    }

    /// Reference returned for an uploaded object.
    pub fn reference_for(&self, object_name: &str) -> String {
        join_reference(&self.reference_base, object_name)
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn upload(&self, local: &Path, object_name: &str) -> Result<String, TransferError> {
        debug!("Uploading {} to {}", local.display(), object_name);
        let bytes = file_len(local).await;

        let result = async {
            let body = ByteStream::from_path(local)
                .await
                .map_err(|e| TransferError::upload_failed(object_name, e))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(object_name)
                .body(body)
                .content_type("video/mp4")
                .send()
                .await
                .map_err(|e| {
                    TransferError::upload_failed(
                        object_name,
                        aws_sdk_s3::error::DisplayErrorContext(e),
                    )
                })?;

            Ok::<_, TransferError>(self.reference_for(object_name))
        }
        .await;

        record_upload(&result, bytes);
        if result.is_ok() {
            info!("Uploaded {} to bucket {}", object_name, self.bucket);
        }
        result
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

/// Copies artifacts into a local publish directory.
pub struct FsArtifactStore {
    publish_dir: PathBuf,
    public_base: Option<String>,
}

impl FsArtifactStore {
    pub fn new(config: &UploadConfig) -> Result<Self, TransferError> {
        let publish_dir = config.publish_dir.clone().ok_or_else(|| {
            TransferError::ClientSetup("filesystem publish_dir missing".to_string())
        })?;
        Ok(Self::with_dir(publish_dir, config.public_base.clone()))
    }

    pub fn with_dir(publish_dir: PathBuf, public_base: Option<String>) -> Self {
        Self {
            publish_dir,
            public_base,
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn upload(&self, local: &Path, object_name: &str) -> Result<String, TransferError> {
        let target = self.publish_dir.join(object_name);

        let result = async {
            tokio::fs::create_dir_all(&self.publish_dir)
                .await
                .map_err(|e| TransferError::upload_failed(object_name, e))?;
            tokio::fs::copy(local, &target)
                .await
                .map_err(|e| TransferError::upload_failed(object_name, e))
        }
        .await;

        let reference = result.map(|_| match &self.public_base {
            Some(base) => join_reference(base, object_name),
            None => target.display().to_string(),
        });

        record_upload(&reference, file_len(&target).await);
        if reference.is_ok() {
            info!("Published {} to {}", object_name, self.publish_dir.display());
        }
        reference
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

/// Used when no artifact store is configured.
pub struct UnconfiguredStore;

#[async_trait]
impl ArtifactStore for UnconfiguredStore {
    async fn upload(&self, _local: &Path, _object_name: &str) -> Result<String, TransferError> {
        Err(TransferError::UploadNotConfigured)
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }
}
