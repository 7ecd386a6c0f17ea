//! Per-job scratch directories.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix of every job working directory under the work root.
pub const WORKDIR_PREFIX: &str = "job-";

/// The working directory of one pipeline invocation, `<root>/job-<id>`.
///
/// The whole tree is removed when the guard is dropped, whichever way the
/// pipeline exits.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub async fn create(root: &Path, job_id: &str) -> std::io::Result<Self> {
        let path = root.join(format!("{}{}", WORKDIR_PREFIX, job_id));
        tokio::fs::create_dir_all(&path).await?;
        debug!(job_id = %job_id, path = %path.display(), "Working directory created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Working directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove working directory"),
        }
    }
}
