//! Configuration for the process runner.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// ffmpeg invocation settings and per-step wall-clock timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Trim and audio-merge steps (stream copy, cheap).
    #[serde(default = "default_trim_timeout")]
    pub trim_timeout_secs: u64,

    #[serde(default = "default_concat_timeout")]
    pub concat_timeout_secs: u64,

    #[serde(default = "default_merge_timeout")]
    pub merge_timeout_secs: u64,

    /// Subtitle burn-in re-encodes the whole video.
    #[serde(default = "default_subtitle_timeout")]
    pub subtitle_timeout_secs: u64,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_trim_timeout() -> u64 {
    300
}

fn default_concat_timeout() -> u64 {
    600
}

fn default_merge_timeout() -> u64 {
    300
}

fn default_subtitle_timeout() -> u64 {
    900
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffmpeg_log_level: default_log_level(),
            trim_timeout_secs: default_trim_timeout(),
            concat_timeout_secs: default_concat_timeout(),
            merge_timeout_secs: default_merge_timeout(),
            subtitle_timeout_secs: default_subtitle_timeout(),
        }
    }
}

impl RunnerConfig {
    pub fn trim_timeout(&self) -> Duration {
        Duration::from_secs(self.trim_timeout_secs)
    }

    pub fn concat_timeout(&self) -> Duration {
        Duration::from_secs(self.concat_timeout_secs)
    }

    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(self.merge_timeout_secs)
    }

    pub fn subtitle_timeout(&self) -> Duration {
        Duration::from_secs(self.subtitle_timeout_secs)
    }
}
