//! The pipeline engine: download, transform, upload.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::args;
use super::error::PipelineError;
use super::request::{
    CompositeRequest, ConcatRequest, MergeAudioRequest, PipelineRequest, SubtitleRequest,
    TrimRequest,
};
use super::workdir::WorkDir;
use crate::runner::{ProcessRunner, RunnerConfig};
use crate::subtitle::{build_ass_document, AssStyle, SubtitleFormat};
use crate::transfer::{ArtifactStore, Downloader};

/// Runs a pipeline to completion and returns the artifact reference.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    async fn execute(&self, job_id: &str, request: &PipelineRequest)
        -> Result<String, PipelineError>;
}

/// Executes pipelines with ffmpeg in per-job working directories.
pub struct PipelineEngine {
    runner: Arc<dyn ProcessRunner>,
    downloader: Downloader,
    artifacts: Arc<dyn ArtifactStore>,
    work_root: PathBuf,
    timeouts: RunnerConfig,
}

impl PipelineEngine {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        downloader: Downloader,
        artifacts: Arc<dyn ArtifactStore>,
        work_root: PathBuf,
        timeouts: RunnerConfig,
    ) -> Self {
        Self {
            runner,
            downloader,
            artifacts,
            work_root,
            timeouts,
        }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    async fn download(&self, job_id: &str, url: &str, dest: &Path) -> Result<(), PipelineError> {
        debug!(job_id = %job_id, step = "download", url = %url, "Downloading input");
        self.downloader.download(url, dest).await?;
        Ok(())
    }

    async fn transform(
        &self,
        job_id: &str,
        step: &str,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<(), PipelineError> {
        debug!(job_id = %job_id, step, "Running ffmpeg step");
        self.runner.run(&args, timeout, job_id).await?;
        Ok(())
    }

    async fn upload(&self, job_id: &str, local: &Path, prefix: &str) -> Result<String, PipelineError> {
        let object_name = format!("{}_{}.mp4", prefix, job_id);
        debug!(job_id = %job_id, step = "upload", object = %object_name, "Uploading artifact");
        let reference = self.artifacts.upload(local, &object_name).await?;
        Ok(reference)
    }

    /// Download each input and, when `trim` is set, cut it to that length.
    /// Raw downloads are deleted once trimmed.
    async fn fetch_parts(
        &self,
        job_id: &str,
        workdir: &WorkDir,
        urls: &[String],
        trim: Option<f64>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let mut parts = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            let raw = workdir.file(&format!("input_{}.mp4", i));
            self.download(job_id, url, &raw).await?;

            match trim {
                Some(duration) => {
                    let trimmed = workdir.file(&format!("trimmed_{}.mp4", i));
                    self.transform(
                        job_id,
                        "trim",
                        args::trim_args(&raw, &trimmed, None, duration),
                        self.timeouts.trim_timeout(),
                    )
                    .await?;
                    discard(&raw).await;
                    parts.push(trimmed);
                }
                None => parts.push(raw),
            }
        }
        Ok(parts)
    }

    /// Join `parts` with the concat demuxer; parts and manifest are deleted
    /// afterwards.
    async fn concat(
        &self,
        job_id: &str,
        workdir: &WorkDir,
        parts: &[PathBuf],
    ) -> Result<PathBuf, PipelineError> {
        let manifest = workdir.file("concat.txt");
        tokio::fs::write(&manifest, args::concat_manifest(parts)).await?;

        let output = workdir.file("concat.mp4");
        self.transform(
            job_id,
            "concat",
            args::concat_args(&manifest, &output),
            self.timeouts.concat_timeout(),
        )
        .await?;

        for part in parts {
            discard(part).await;
        }
        discard(&manifest).await;
        Ok(output)
    }

    async fn burn_in(
        &self,
        job_id: &str,
        workdir: &WorkDir,
        video: &Path,
        document: &str,
        format: SubtitleFormat,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let subs = workdir.file(&format!("subs.{}", format.extension()));
        tokio::fs::write(&subs, document).await?;
        self.transform(
            job_id,
            "subtitles",
            args::subtitle_args(video, &subs, format, output),
            self.timeouts.subtitle_timeout(),
        )
        .await?;
        discard(&subs).await;
        Ok(())
    }

    async fn run_trim(&self, job_id: &str, req: &TrimRequest) -> Result<String, PipelineError> {
        let workdir = WorkDir::create(&self.work_root, job_id).await?;
        let input = workdir.file("input.mp4");
        let output = workdir.file("trimmed.mp4");

        self.download(job_id, &req.video_url, &input).await?;
        self.transform(
            job_id,
            "trim",
            args::trim_args(&input, &output, Some(req.start), req.duration),
            self.timeouts.trim_timeout(),
        )
        .await?;
        discard(&input).await;

        self.upload(job_id, &output, "trimmed").await
    }

    async fn run_trim_concat(
        &self,
        job_id: &str,
        req: &ConcatRequest,
    ) -> Result<String, PipelineError> {
        let workdir = WorkDir::create(&self.work_root, job_id).await?;
        let parts = self
            .fetch_parts(job_id, &workdir, &req.video_urls, req.trim_duration)
            .await?;
        let output = self.concat(job_id, &workdir, &parts).await?;
        self.upload(job_id, &output, "concat").await
    }

    async fn run_merge_audio(
        &self,
        job_id: &str,
        req: &MergeAudioRequest,
    ) -> Result<String, PipelineError> {
        let workdir = WorkDir::create(&self.work_root, job_id).await?;
        let video = workdir.file("video.mp4");
        let audio = workdir.file("audio_input");
        let output = workdir.file("merged.mp4");

        self.download(job_id, &req.video_url, &video).await?;
        self.download(job_id, &req.audio_url, &audio).await?;
        self.transform(
            job_id,
            "merge_audio",
            args::merge_audio_args(&video, &audio, req.shortest, &output),
            self.timeouts.merge_timeout(),
        )
        .await?;

        self.upload(job_id, &output, "merged").await
    }

    async fn run_subtitle_burn(
        &self,
        job_id: &str,
        req: &SubtitleRequest,
    ) -> Result<String, PipelineError> {
        let workdir = WorkDir::create(&self.work_root, job_id).await?;
        let video = workdir.file("video.mp4");
        let output = workdir.file("subtitled.mp4");

        self.download(job_id, &req.video_url, &video).await?;
        let (document, format) = req.document();
        self.burn_in(job_id, &workdir, &video, &document, format, &output)
            .await?;

        self.upload(job_id, &output, "subtitled").await
    }

    async fn run_composite(
        &self,
        job_id: &str,
        req: &CompositeRequest,
    ) -> Result<String, PipelineError> {
        let workdir = WorkDir::create(&self.work_root, job_id).await?;

        let parts = self
            .fetch_parts(job_id, &workdir, &req.video_urls, Some(req.trim_duration))
            .await?;
        let mut current = self.concat(job_id, &workdir, &parts).await?;

        if let Some(audio_url) = &req.audio_url {
            let audio = workdir.file("audio_input");
            let with_audio = workdir.file("with_audio.mp4");
            self.download(job_id, audio_url, &audio).await?;
            self.transform(
                job_id,
                "merge_audio",
                args::merge_audio_args(&current, &audio, true, &with_audio),
                self.timeouts.merge_timeout(),
            )
            .await?;
            discard(&current).await;
            discard(&audio).await;
            current = with_audio;
        }

        let overlays = req.overlay_entries();
        if !overlays.is_empty() {
            let document = build_ass_document(&overlays, &AssStyle::default());
            let text_output = workdir.file("final.mp4");
            self.burn_in(
                job_id,
                &workdir,
                &current,
                &document,
                SubtitleFormat::Ass,
                &text_output,
            )
            .await?;
            discard(&current).await;
            current = text_output;
        }

        self.upload(job_id, &current, "composite").await
    }
}

#[async_trait]
impl PipelineExecutor for PipelineEngine {
    async fn execute(
        &self,
        job_id: &str,
        request: &PipelineRequest,
    ) -> Result<String, PipelineError> {
        info!(job_id = %job_id, kind = %request.kind(), "Pipeline started");
        match request {
            PipelineRequest::Trim(r) => self.run_trim(job_id, r).await,
            PipelineRequest::TrimConcat(r) => self.run_trim_concat(job_id, r).await,
            PipelineRequest::MergeAudio(r) => self.run_merge_audio(job_id, r).await,
            PipelineRequest::SubtitleBurn(r) => self.run_subtitle_burn(job_id, r).await,
            PipelineRequest::Composite(r) => self.run_composite(job_id, r).await,
        }
    }
}

/// Remove an intermediate file that is no longer needed. The working
/// directory guard removes anything left behind, so failures only warn.
async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove intermediate file");
        }
    }
}
