//! Pipeline requests and their validation.

use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use crate::job::JobKind;
use crate::subtitle::{AssStyle, SubtitleEntry, SubtitleFormat, SubtitlePosition, DEFAULT_FONT_SIZE};

/// Upper bound on inputs for the multi-input pipelines.
pub const MAX_INPUTS: usize = 20;

/// Default per-input trim for the composite pipeline, in seconds.
pub const DEFAULT_TRIM_SECS: f64 = 5.0;

fn default_trim() -> f64 {
    DEFAULT_TRIM_SECS
}

fn default_true() -> bool {
    true
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_font_color() -> String {
    "white".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimRequest {
    pub video_url: String,
    #[serde(default = "default_trim")]
    pub duration: f64,
    #[serde(default)]
    pub start: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatRequest {
    pub video_urls: Vec<String>,
    /// When set, each input is cut to this many seconds before joining.
    #[serde(default)]
    pub trim_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeAudioRequest {
    pub video_url: String,
    pub audio_url: String,
    /// Stop at the end of the shorter stream.
    #[serde(default = "default_true")]
    pub shortest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleRequest {
    pub video_url: String,
    /// A finished document; takes precedence over `subtitles`.
    #[serde(default)]
    pub subtitle_content: Option<String>,
    #[serde(default)]
    pub format: SubtitleFormat,
    /// Timed entries rendered into a generated ASS document.
    #[serde(default)]
    pub subtitles: Vec<SubtitleEntry>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
}

impl SubtitleRequest {
    /// The document to burn in and its format.
    pub fn document(&self) -> (String, SubtitleFormat) {
        match self.subtitle_content.as_deref() {
            Some(content) if !content.trim().is_empty() => (content.to_string(), self.format),
            _ => {
                let style = AssStyle {
                    font_size: self.font_size,
                    font_color: self.font_color.clone(),
                };
                (
                    crate::subtitle::build_ass_document(&self.subtitles, &style),
                    SubtitleFormat::Ass,
                )
            }
        }
    }
}

/// Text shown over one segment of a composite video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentText {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRequest {
    pub video_urls: Vec<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub segments: Vec<SegmentText>,
    #[serde(default = "default_trim")]
    pub trim_duration: f64,
    #[serde(default)]
    pub add_text: bool,
}

impl CompositeRequest {
    /// Overlay entries for the segment texts. Segment `i` covers
    /// `[i * d, (i + 1) * d)`; titles sit at the bottom, captions at the top.
    pub fn overlay_entries(&self) -> Vec<SubtitleEntry> {
        if !self.add_text {
            return Vec::new();
        }

        let d = self.trim_duration;
        let mut entries = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            let start = i as f64 * d;
            let end = start + d;
            let texts = [
                (&segment.title, SubtitlePosition::Bottom),
                (&segment.caption, SubtitlePosition::Top),
            ];
            for (text, position) in texts {
                if let Some(text) = text.as_deref().filter(|t| !t.trim().is_empty()) {
                    entries.push(SubtitleEntry {
                        text: text.to_string(),
                        start,
                        end,
                        position,
                    });
                }
            }
        }
        entries
    }
}

/// A validated unit of work for the pipeline engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineRequest {
    Trim(TrimRequest),
    TrimConcat(ConcatRequest),
    MergeAudio(MergeAudioRequest),
    SubtitleBurn(SubtitleRequest),
    Composite(CompositeRequest),
}

impl PipelineRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            PipelineRequest::Trim(_) => JobKind::Trim,
            PipelineRequest::TrimConcat(_) => JobKind::TrimConcat,
            PipelineRequest::MergeAudio(_) => JobKind::MergeAudio,
            PipelineRequest::SubtitleBurn(_) => JobKind::SubtitleBurn,
            PipelineRequest::Composite(_) => JobKind::Composite,
        }
    }

    /// Reject requests that can never succeed, before a job is created.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            PipelineRequest::Trim(r) => {
                require_url("video_url", &r.video_url)?;
                require_positive("duration", r.duration)?;
                require_non_negative("start", r.start)
            }
            PipelineRequest::TrimConcat(r) => {
                require_urls(&r.video_urls, 2)?;
                if let Some(d) = r.trim_duration {
                    require_positive("trim_duration", d)?;
                }
                Ok(())
            }
            PipelineRequest::MergeAudio(r) => {
                require_url("video_url", &r.video_url)?;
                require_url("audio_url", &r.audio_url)
            }
            PipelineRequest::SubtitleBurn(r) => {
                require_url("video_url", &r.video_url)?;
                let has_content = r
                    .subtitle_content
                    .as_deref()
                    .is_some_and(|c| !c.trim().is_empty());
                if !has_content && r.subtitles.is_empty() {
                    return Err(PipelineError::invalid(
                        "subtitle_content or subtitles is required",
                    ));
                }
                if r.font_size == 0 {
                    return Err(PipelineError::invalid("font_size must be positive"));
                }
                for entry in &r.subtitles {
                    require_non_negative("subtitles.start", entry.start)?;
                    if !entry.end.is_finite() || entry.end <= entry.start {
                        return Err(PipelineError::invalid(
                            "subtitles.end must be after subtitles.start",
                        ));
                    }
                }
                Ok(())
            }
            PipelineRequest::Composite(r) => {
                require_urls(&r.video_urls, 1)?;
                require_positive("trim_duration", r.trim_duration)?;
                if let Some(audio) = &r.audio_url {
                    require_url("audio_url", audio)?;
                }
                Ok(())
            }
        }
    }
}

fn require_url(field: &str, url: &str) -> Result<(), PipelineError> {
    if url.trim().is_empty() {
        return Err(PipelineError::invalid(format!("{} is required", field)));
    }
    Ok(())
}

fn require_urls(urls: &[String], min: usize) -> Result<(), PipelineError> {
    if urls.len() < min {
        return Err(PipelineError::invalid(format!(
            "at least {} video URL{} required",
            min,
            if min == 1 { " is" } else { "s are" }
        )));
    }
    if urls.len() > MAX_INPUTS {
        return Err(PipelineError::invalid(format!(
            "at most {} videos are allowed",
            MAX_INPUTS
        )));
    }
    urls.iter().try_for_each(|u| require_url("video_urls", u))
}

fn require_positive(field: &str, value: f64) -> Result<(), PipelineError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PipelineError::invalid(format!("{} must be positive", field)));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> Result<(), PipelineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PipelineError::invalid(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}
