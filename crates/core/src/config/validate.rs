use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - An API key is present when api_key auth is selected
/// - Worker pool sizes, runner timeouts and the janitor interval are non-zero
/// - Work dirs are only considered stale well after any single step could end
/// - The upload section has the fields its backend needs
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.workers.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "workers.max_concurrent_jobs must be at least 1".to_string(),
        ));
    }

    let runner = &config.runner;
    for (name, value) in [
        ("runner.trim_timeout_secs", runner.trim_timeout_secs),
        ("runner.concat_timeout_secs", runner.concat_timeout_secs),
        ("runner.merge_timeout_secs", runner.merge_timeout_secs),
        ("runner.subtitle_timeout_secs", runner.subtitle_timeout_secs),
        (
            "storage.janitor_interval_secs",
            config.storage.janitor_interval_secs,
        ),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be 0",
                name
            )));
        }
    }

    let longest_step = [
        runner.trim_timeout_secs,
        runner.concat_timeout_secs,
        runner.merge_timeout_secs,
        runner.subtitle_timeout_secs,
    ]
    .into_iter()
    .max()
    .unwrap_or_default()
        + config.transfer.download_timeout_secs;
    if config.storage.stale_after_secs <= longest_step {
        return Err(ConfigError::ValidationError(format!(
            "storage.stale_after_secs must exceed the longest runner timeout plus \
             transfer.download_timeout_secs ({}s)",
            longest_step
        )));
    }

    if let Some(upload) = &config.upload {
        upload
            .check()
            .map_err(|reason| ConfigError::ValidationError(format!("upload: {}", reason)))?;
    }

    Ok(())
}
