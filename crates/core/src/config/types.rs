use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::dispatch::WorkerConfig;
use crate::runner::RunnerConfig;
use crate::transfer::{TransferConfig, UploadConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Artifact store. Absent means uploads are disabled and every pipeline
    /// fails with `upload_not_configured` at its upload step.
    #[serde(default)]
    pub upload: Option<UploadConfig>,
    #[serde(default)]
    pub workers: WorkerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8000
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Required when `method = "api_key"`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelwork.db")
}

/// Working storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root under which per-job working directories and runner logs live.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// How often the janitor sweeps the work root.
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_secs: u64,
    /// Entries in the work root older than this are removed by the janitor.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            janitor_interval_secs: default_janitor_interval(),
            stale_after_secs: default_stale_after(),
        }
    }
}

impl StorageConfig {
    /// Directory holding per-invocation ffmpeg logs.
    pub fn log_dir(&self) -> PathBuf {
        self.work_dir.join("logs")
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("reelwork")
}

fn default_janitor_interval() -> u64 {
    300
}

fn default_stale_after() -> u64 {
    1800
}
