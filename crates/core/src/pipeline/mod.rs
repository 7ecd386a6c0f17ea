//! Media pipelines.
//!
//! Every pipeline follows the same shape: download inputs into a private
//! working directory, run one or more ffmpeg steps, upload the final
//! artifact. Intermediates are deleted as soon as the next step has consumed
//! them, and the working directory itself is removed when the pipeline
//! returns, whether it succeeded or not.
//!
//! | Kind            | Steps                                              | Object prefix |
//! |-----------------|----------------------------------------------------|---------------|
//! | `trim`          | download, trim                                     | `trimmed`     |
//! | `trim_concat`   | download + trim (each), concat                     | `concat`      |
//! | `merge_audio`   | download video + audio, merge                      | `merged`      |
//! | `subtitle_burn` | download, burn-in                                  | `subtitled`   |
//! | `composite`     | trim (each), concat, merge audio?, burn-in text?   | `composite`   |

pub mod args;
mod engine;
mod error;
mod request;
mod workdir;

pub use engine::{PipelineEngine, PipelineExecutor};
pub use error::PipelineError;
pub use request::{
    CompositeRequest, ConcatRequest, MergeAudioRequest, PipelineRequest, SegmentText,
    SubtitleRequest, TrimRequest, DEFAULT_TRIM_SECS, MAX_INPUTS,
};
pub use workdir::{WorkDir, WORKDIR_PREFIX};
