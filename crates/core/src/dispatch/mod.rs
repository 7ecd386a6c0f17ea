//! Job dispatch: admission control, the worker pool, and supervised
//! execution of pipelines.

mod config;
mod dispatcher;
mod types;
mod worker;

pub use config::WorkerConfig;
pub use dispatcher::Dispatcher;
pub use types::{DispatchError, PoolStatus};
pub use worker::{run_job, EMPTY_RESULT_ERROR};
