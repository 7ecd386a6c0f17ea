//! Moving media in and out: streaming downloads of remote inputs and
//! publication of finished artifacts.

mod config;
mod download;
mod error;
mod upload;

pub use config::{TransferConfig, UploadBackend, UploadConfig};
pub use download::Downloader;
pub use error::TransferError;
pub use upload::{
    create_artifact_store, ArtifactStore, FsArtifactStore, S3ArtifactStore, UnconfiguredStore,
};
