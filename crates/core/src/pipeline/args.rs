//! ffmpeg argument lists for each pipeline step.
//!
//! Global flags (`-hide_banner`, `-loglevel`, ...) are added by the runner;
//! these builders only produce the step-specific part, ending with the output
//! path.

use std::path::Path;

use crate::subtitle::SubtitleFormat;

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Seconds as ffmpeg expects them: `5`, `2.5`.
fn seconds_arg(secs: f64) -> String {
    secs.to_string()
}

/// Stream-copy cut of `duration` seconds, optionally seeking to `start` first.
pub fn trim_args(input: &Path, output: &Path, start: Option<f64>, duration: f64) -> Vec<String> {
    let mut args = Vec::with_capacity(12);
    if let Some(start) = start {
        args.extend(["-ss".to_string(), seconds_arg(start)]);
    }
    args.extend([
        "-i".to_string(),
        path_arg(input),
        "-t".to_string(),
        seconds_arg(duration),
        "-c".to_string(),
        "copy".to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        path_arg(output),
    ]);
    args
}

/// Concat-demuxer manifest: one `file '<path>'` line per input.
pub fn concat_manifest<P: AsRef<Path>>(inputs: &[P]) -> String {
    inputs
        .iter()
        .map(|p| {
            let escaped = p.as_ref().to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

pub fn concat_args(manifest: &Path, output: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        path_arg(manifest),
        "-c".to_string(),
        "copy".to_string(),
        path_arg(output),
    ]
}

/// Video stream copied from the first input, audio re-encoded from the second.
pub fn merge_audio_args(video: &Path, audio: &Path, shortest: bool, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        path_arg(video),
        "-i".to_string(),
        path_arg(audio),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
    ];
    if shortest {
        args.push("-shortest".to_string());
    }
    args.push(path_arg(output));
    args
}

/// Escape a value for use as a filter option inside a filtergraph.
///
/// ffmpeg unescapes twice: the option parser sees the value after the
/// filtergraph parser has stripped one level. The option level is escaped
/// with backslashes, then the result is single-quoted for the graph level.
fn escape_filter_value(value: &str) -> String {
    let mut option = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | '\'') {
            option.push('\\');
        }
        option.push(c);
    }
    // Quotes cannot nest, so a literal quote is escaped outside the quoted token.
    format!("'{}'", option.replace('\'', r"'\''"))
}

/// Burn-in re-encode, tuned for a small memory footprint.
pub fn subtitle_args(
    video: &Path,
    subtitles: &Path,
    format: SubtitleFormat,
    output: &Path,
) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(video),
        "-vf".to_string(),
        format!(
            "{}={}",
            format.filter_name(),
            escape_filter_value(&subtitles.to_string_lossy())
        ),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-crf".to_string(),
        "28".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        "-threads".to_string(),
        "1".to_string(),
        path_arg(output),
    ]
}
