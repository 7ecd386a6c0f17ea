pub mod auth;
pub mod config;
pub mod dispatch;
pub mod housekeeping;
pub mod job;
pub mod metrics;
pub mod pipeline;
pub mod runner;
pub mod subtitle;
pub mod testing;
pub mod transfer;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
};
pub use dispatch::{DispatchError, Dispatcher, PoolStatus, WorkerConfig};
pub use job::{Job, JobError, JobKind, JobStatus, JobStore, SqliteJobStore};
pub use pipeline::{PipelineEngine, PipelineError, PipelineExecutor, PipelineRequest};
pub use runner::{FfmpegRunner, ProcessRunner, RunnerConfig, RunnerError};
pub use transfer::{create_artifact_store, ArtifactStore, Downloader, TransferError};
