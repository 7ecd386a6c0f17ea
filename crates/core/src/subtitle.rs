//! Subtitle documents for burn-in.
//!
//! Callers either hand over a finished SRT/ASS document or a list of timed
//! entries, from which an ASS document is generated here.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Default font size for generated documents.
pub const DEFAULT_FONT_SIZE: u32 = 24;

/// Format of a caller-supplied subtitle document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Ass,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Ass => "ass",
        }
    }

    /// ffmpeg video filter that renders this format.
    pub fn filter_name(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "subtitles",
            SubtitleFormat::Ass => "ass",
        }
    }
}

/// Vertical placement of an entry; each maps to a style in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    #[default]
    Bottom,
    Top,
    Center,
}

impl SubtitlePosition {
    fn style_name(&self) -> &'static str {
        match self {
            SubtitlePosition::Bottom => "Bottom",
            SubtitlePosition::Top => "Top",
            SubtitlePosition::Center => "Center",
        }
    }
}

/// One timed line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub text: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default = "default_end")]
    pub end: f64,
    #[serde(default)]
    pub position: SubtitlePosition,
}

fn default_end() -> f64 {
    5.0
}

/// Font settings shared by every style of a generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssStyle {
    pub font_size: u32,
    /// Colour name; unknown names render white.
    pub font_color: String,
}

impl Default for AssStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            font_color: "white".to_string(),
        }
    }
}

/// ASS `&H00BBGGRR` code for a colour name.
pub fn color_code(name: &str) -> &'static str {
    match name.to_ascii_lowercase().as_str() {
        "black" => "&H00000000",
        "yellow" => "&H0000FFFF",
        "red" => "&H000000FF",
        "green" => "&H0000FF00",
        "blue" => "&H00FF0000",
        _ => "&H00FFFFFF",
    }
}

/// Format seconds as `H:MM:SS.cc`. Negative input clamps to zero.
pub fn format_ass_time(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs / 6_000) % 60;
    let secs = (total_cs / 100) % 60;
    let centis = total_cs % 100;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, centis)
}

/// Escape characters that ASS treats as override markup.
pub fn escape_ass_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            _ => out.push(c),
        }
    }
    out
}

/// Build a complete ASS document with one dialogue line per entry.
pub fn build_ass_document(entries: &[SubtitleEntry], style: &AssStyle) -> String {
    let color = color_code(&style.font_color);
    let mut doc = String::from(
        "[Script Info]\n\
         Title: Generated Subtitles\n\
         ScriptType: v4.00+\n\
         PlayResX: 1920\n\
         PlayResY: 1080\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );

    // Numpad alignment: 2 bottom-centre, 8 top-centre, 5 middle.
    for (name, alignment) in [("Bottom", 2), ("Top", 8), ("Center", 5)] {
        let _ = writeln!(
            doc,
            "Style: {},Arial,{},{},&H000000FF,&H00000000,&H80000000,-1,0,0,0,100,100,0,0,1,2,1,{},10,10,30,1",
            name, style.font_size, color, alignment
        );
    }

    doc.push_str(
        "\n[Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
    );

    for entry in entries {
        let _ = writeln!(
            doc,
            "Dialogue: 0,{},{},{},,0,0,0,,{}",
            format_ass_time(entry.start),
            format_ass_time(entry.end),
            entry.position.style_name(),
            escape_ass_text(&entry.text)
        );
    }

    doc
}
