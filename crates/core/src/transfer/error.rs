//! Error types for transfers.

use thiserror::Error;

/// Errors moving bytes in or out of the service.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The remote input could not be fetched: non-2xx, connect error,
    /// timeout, size limit, or a local write failure while streaming.
    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// No artifact store is configured.
    #[error("Upload is not configured")]
    UploadNotConfigured,

    /// The artifact store rejected or failed the transfer.
    #[error("Upload of {object} failed: {reason}")]
    UploadFailed { object: String, reason: String },

    /// The HTTP or object-store client could not be built.
    #[error("Transfer client setup failed: {0}")]
    ClientSetup(String),
}

impl TransferError {
    pub fn download_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upload_failed(object: impl Into<String>, reason: impl ToString) -> Self {
        Self::UploadFailed {
            object: object.into(),
            reason: reason.to_string(),
        }
    }
}
