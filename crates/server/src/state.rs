use std::path::Path;
use std::sync::Arc;
use reelwork_core::{Authenticator, Config, Dispatcher, JobStore, ProcessRunner};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    dispatcher: Arc<Dispatcher>,
    runner: Arc<dyn ProcessRunner>,
    upload_configured: bool,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        dispatcher: Arc<Dispatcher>,
        runner: Arc<dyn ProcessRunner>,
        upload_configured: bool,
    ) -> Self {
        Self {
            config,
            authenticator,
            dispatcher,
            runner,
            upload_configured,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.dispatcher.as_ref()
    }

    pub fn store(&self) -> &dyn JobStore {
        self.dispatcher.store().as_ref()
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.storage.work_dir
    }

    pub fn upload_configured(&self) -> bool {
        self.upload_configured
    }
}
