//! The derivation engine.
//!
//! One job fans a source video out into clips (every range in every aspect
//! ratio, sequentially, ratios inside ranges), then loops, stills and shorts
//! (each category concurrent, bounded by the FFmpeg semaphore). A failed unit
//! is recorded on the job and the batch carries on; the job only fails when
//! nothing at all was produced or packaging fails.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use tokio::sync::Semaphore;
use tracing::Instrument;

use reelcut_jobs::{JobHandle, JobRegistry};
use reelcut_media::stills::STILL_COUNT;
use reelcut_media::{
    plan_loop_starts, plan_short_starts, render_clip, render_loop, render_short, render_still,
    still_positions, ClipSpec, MediaError, MediaResult, Transcoder,
};
use reelcut_models::{
    format_seconds, ArtifactCategory, AspectRatio, JobStatus, OutputArtifact, ProcessRequest,
    SourceVideo, WorkPlan,
};
use reelcut_storage::{archive, ArchiveInfo, StorageError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::plan::{build_plan, UnitCounts};

pub fn clip_file_name(base: &str, range_no: usize, ratio: AspectRatio) -> String {
    format!("{}_clip{:02}_{}.mp4", base, range_no, ratio.tag())
}

pub fn loop_file_name(base: &str, n: usize) -> String {
    format!("{}_loop{:02}.gif", base, n)
}

pub fn still_file_name(base: &str, n: usize) -> String {
    format!("{}_still{:02}.jpg", base, n)
}

pub fn short_file_name(base: &str, n: usize) -> String {
    format!("{}_short{:02}.mp4", base, n)
}

/// Download route for a job's archive.
pub fn download_path(video_id: &str) -> String {
    format!("/api/download/{}", video_id)
}

/// A registered job that has not started running yet.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub handle: Arc<JobHandle>,
    pub plan: WorkPlan,
    pub counts: UnitCounts,
    /// Source duration used for planning (probed if the record had none)
    pub duration: f64,
    pub warnings: Vec<String>,
    source: PathBuf,
}

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub artifacts: Vec<OutputArtifact>,
    pub errors: Vec<String>,
    pub archive: ArchiveInfo,
    pub download_path: String,
}

/// Everything a unit needs to run and report.
struct UnitContext<'a> {
    handle: &'a JobHandle,
    plan: &'a WorkPlan,
    source: &'a Path,
    work_dir: &'a Path,
    duration: f64,
    logger: &'a JobLogger,
}

pub struct DerivationEngine {
    transcoder: Arc<dyn Transcoder>,
    jobs: Arc<JobRegistry>,
    config: WorkerConfig,
    archives_dir: PathBuf,
    ffmpeg_semaphore: Arc<Semaphore>,
}

impl DerivationEngine {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        jobs: Arc<JobRegistry>,
        config: WorkerConfig,
        archives_dir: PathBuf,
    ) -> Self {
        let ffmpeg_semaphore = Arc::new(Semaphore::new(config.max_ffmpeg_processes.max(1)));
        Self {
            transcoder,
            jobs,
            config,
            archives_dir,
            ffmpeg_semaphore,
        }
    }

    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.transcoder
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Validate a request and register its job.
    ///
    /// Probes the source when its duration is not yet known. Fails without
    /// registering anything if the plan is invalid, and with a conflict if
    /// the video already has a job in flight.
    pub async fn prepare(&self, video: &SourceVideo, request: &ProcessRequest) -> WorkerResult<PreparedJob> {
        if !tokio::fs::try_exists(&video.path).await.unwrap_or(false) {
            return Err(MediaError::FileNotFound(video.path.clone()).into());
        }

        let duration = match video.duration {
            Some(d) => d,
            None => self.transcoder.probe(&video.path).await?.duration,
        };

        let work = build_plan(video, request, duration)?;
        let handle = self.jobs.begin(video.id.clone(), work.counts.total() as u32)?;

        Ok(PreparedJob {
            handle,
            plan: work.plan,
            counts: work.counts,
            duration,
            warnings: work.warnings,
            source: video.path.clone(),
        })
    }

    /// Prepare and run a job to completion.
    pub async fn process(&self, video: &SourceVideo, request: &ProcessRequest) -> WorkerResult<JobOutcome> {
        let job = self.prepare(video, request).await?;
        self.execute(job).await
    }

    /// Run every unit of a prepared job, then package the archive.
    pub async fn execute(&self, job: PreparedJob) -> WorkerResult<JobOutcome> {
        let handle = Arc::clone(&job.handle);
        let logger = JobLogger::new(&job.plan.video_id, "derive");
        let span = logger.create_span();

        let result = self.run_job(job, &logger).instrument(span).await;

        match &result {
            Ok(outcome) => {
                counter!("reelcut_jobs_completed_total").increment(1);
                logger.log_completion(&format!(
                    "{} artifacts, {} errors, archive {}",
                    outcome.artifacts.len(),
                    outcome.errors.len(),
                    outcome.archive.file_name
                ));
            }
            Err(WorkerError::Cancelled) => {
                logger.log_warning("Stopped after cancellation");
            }
            Err(e) => {
                counter!("reelcut_jobs_failed_total").increment(1);
                logger.log_error(&e.to_string());
                handle.fail(e.to_string());
            }
        }
        result
    }

    async fn run_job(&self, job: PreparedJob, logger: &JobLogger) -> WorkerResult<JobOutcome> {
        let PreparedJob {
            handle,
            plan,
            counts,
            duration,
            source,
            ..
        } = job;
        let video_id = plan.video_id.to_string();

        let work_dir = self.config.job_dir(&video_id);
        tokio::fs::create_dir_all(&work_dir).await?;
        handle.set_work_dir(work_dir.clone());

        logger.log_start(&format!(
            "{} units ({} clips, {} loops, {} stills, {} shorts) from {:.1}s source",
            counts.total(),
            counts.clips,
            counts.loops,
            counts.stills,
            counts.shorts,
            duration
        ));

        let ctx = UnitContext {
            handle: &handle,
            plan: &plan,
            source: &source,
            work_dir: &work_dir,
            duration,
            logger,
        };

        self.derive_clips(&ctx).await;
        if plan.export_loops {
            self.derive_loops(&ctx).await;
        }
        if plan.export_stills {
            self.derive_stills(&ctx).await;
        }
        if plan.export_shorts {
            self.derive_shorts(&ctx).await;
        }

        if handle.is_cancelled() {
            return Err(WorkerError::Cancelled);
        }

        let snapshot = handle.snapshot();
        if snapshot.outputs.is_empty() {
            return Err(WorkerError::NothingGenerated);
        }
        logger.log_progress(&format!("Packaging {} artifacts", snapshot.outputs.len()));

        let archive = archive::package(&self.archives_dir, &video_id, &plan.output_name, &snapshot.outputs)
            .await
            .map_err(|e| match e {
                StorageError::NothingToPackage => WorkerError::NothingGenerated,
                other => WorkerError::PackagingFailed(other.to_string()),
            })?;

        let download = download_path(&video_id);
        handle.complete(archive.path.clone(), download.clone());
        if handle.status() != JobStatus::Completed {
            return Err(WorkerError::Cancelled);
        }

        let snapshot = handle.snapshot();
        Ok(JobOutcome {
            artifacts: snapshot.outputs,
            errors: snapshot.errors,
            archive,
            download_path: download,
        })
    }

    async fn derive_clips(&self, ctx: &UnitContext<'_>) {
        for (index, range) in ctx.plan.ranges.iter().enumerate() {
            for ratio in &ctx.plan.aspect_ratios {
                if ctx.handle.is_cancelled() {
                    return;
                }

                let output = ctx
                    .work_dir
                    .join(clip_file_name(&ctx.plan.output_name, index + 1, *ratio));
                let spec = ClipSpec {
                    start: range.start_secs(),
                    end: range.end_secs(),
                    ratio: *ratio,
                    quality: ctx.plan.quality,
                    fade: ctx.plan.fade,
                };
                let label = format!(
                    "Clip {} ({}) {}-{}",
                    index + 1,
                    ratio.as_str(),
                    range.start,
                    range.end
                );

                let result = render_clip(
                    self.transcoder.as_ref(),
                    ctx.source,
                    &output,
                    &spec,
                    Some(ctx.duration),
                    ctx.handle.cancel_signal(),
                )
                .await;

                let result = result.map(|outcome| {
                    if outcome.fade_clamped {
                        ctx.logger.log_warning(&format!(
                            "{}: fade shortened to fit the clip",
                            label
                        ));
                    }
                    if outcome.used_fallback {
                        ctx.logger.log_progress(&format!("{}: produced by padded fallback", label));
                    }
                });
                settle(ctx, ArtifactCategory::Clip, Some(*ratio), &label, output, result);
            }
        }
    }

    async fn derive_loops(&self, ctx: &UnitContext<'_>) {
        let starts = plan_loop_starts(ctx.duration, &mut rand::rng());

        let units = starts.into_iter().enumerate().map(|(i, start)| {
            let output = ctx.work_dir.join(loop_file_name(&ctx.plan.output_name, i + 1));
            let label = format!("Loop {} at {}", i + 1, format_seconds(start));
            async move {
                let Ok(_permit) = self.ffmpeg_semaphore.acquire().await else {
                    return;
                };
                if ctx.handle.is_cancelled() {
                    return;
                }
                let result = render_loop(
                    self.transcoder.as_ref(),
                    ctx.source,
                    start,
                    &output,
                    ctx.handle.cancel_signal(),
                )
                .await;
                settle(ctx, ArtifactCategory::Loop, None, &label, output, result);
            }
        });

        join_all(units).await;
    }

    async fn derive_stills(&self, ctx: &UnitContext<'_>) {
        let positions = still_positions(ctx.duration, STILL_COUNT);

        let units = positions.into_iter().enumerate().map(|(i, at)| {
            let output = ctx.work_dir.join(still_file_name(&ctx.plan.output_name, i + 1));
            let label = format!("Still {} at {}", i + 1, format_seconds(at));
            async move {
                let Ok(_permit) = self.ffmpeg_semaphore.acquire().await else {
                    return;
                };
                if ctx.handle.is_cancelled() {
                    return;
                }
                let result = render_still(
                    self.transcoder.as_ref(),
                    ctx.source,
                    at,
                    &output,
                    ctx.handle.cancel_signal(),
                )
                .await;
                settle(ctx, ArtifactCategory::Still, None, &label, output, result);
            }
        });

        join_all(units).await;
    }

    /// Shorts share one wall-clock budget; whatever has not finished when it
    /// runs out is dropped, which kills its FFmpeg process.
    async fn derive_shorts(&self, ctx: &UnitContext<'_>) {
        let starts = plan_short_starts(ctx.duration, &mut rand::rng());
        let finished: Vec<AtomicBool> = starts.iter().map(|_| AtomicBool::new(false)).collect();
        let scratch_root = ctx.work_dir.join("scratch");

        let units = starts.iter().enumerate().map(|(i, &start)| {
            let output = ctx.work_dir.join(short_file_name(&ctx.plan.output_name, i + 1));
            let label = format!("Short {} at {}", i + 1, format_seconds(start));
            let finished = &finished[i];
            let scratch_root = &scratch_root;
            async move {
                let Ok(_permit) = self.ffmpeg_semaphore.acquire().await else {
                    return;
                };
                if !ctx.handle.is_cancelled() {
                    let result = render_short(
                        self.transcoder.as_ref(),
                        ctx.source,
                        start,
                        &output,
                        scratch_root,
                        ctx.handle.cancel_signal(),
                    )
                    .await;
                    settle(ctx, ArtifactCategory::Short, None, &label, output, result);
                }
                finished.store(true, Ordering::SeqCst);
            }
        });

        let budget = self.config.shorts_timeout;
        if tokio::time::timeout(budget, join_all(units)).await.is_err() {
            for (i, &start) in starts.iter().enumerate() {
                if finished[i].load(Ordering::SeqCst) {
                    continue;
                }
                let output = ctx.work_dir.join(short_file_name(&ctx.plan.output_name, i + 1));
                let _ = tokio::fs::remove_file(&output).await;
                let message = format!(
                    "Short {} at {}: timed out after {}s",
                    i + 1,
                    format_seconds(start),
                    budget.as_secs()
                );
                counter!("reelcut_units_total", "category" => "shorts", "outcome" => "timeout").increment(1);
                ctx.logger.log_error(&message);
                ctx.handle.record_failure(message);
            }
        }
        let _ = tokio::fs::remove_dir_all(&scratch_root).await;
    }

    /// Remove the work and archive directories of a pruned job.
    pub async fn cleanup_job(&self, handle: &JobHandle) {
        if let Some(dir) = handle.work_dir() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
        if let Err(e) = archive::remove_job_archive(&self.archives_dir, handle.video_id().as_str()).await {
            tracing::warn!(video_id = %handle.video_id(), error = %e, "Failed to remove job archive");
        }
    }
}

/// Record the outcome of one unit on the job.
fn settle(
    ctx: &UnitContext<'_>,
    category: ArtifactCategory,
    ratio: Option<AspectRatio>,
    label: &str,
    output: PathBuf,
    result: MediaResult<()>,
) {
    match result {
        Ok(()) => {
            counter!("reelcut_units_total", "category" => category.as_str(), "outcome" => "ok").increment(1);
            let artifact = match ratio {
                Some(ratio) => OutputArtifact::clip(ratio, output),
                None => OutputArtifact::new(category, output),
            };
            ctx.handle.record_success(artifact);
        }
        // The job already carries the cancellation note.
        Err(e) if e.is_cancelled() => {}
        Err(e) => {
            counter!("reelcut_units_total", "category" => category.as_str(), "outcome" => "failed").increment(1);
            let message = format!("{}: {}", label, e.summary());
            ctx.logger.log_error(&message);
            ctx.handle.record_failure(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use reelcut_media::testing::FakeTranscoder;
    use reelcut_models::job_status::CANCELLED_NOTE;
    use reelcut_models::{Quality, VideoId};

    struct Fixture {
        _dir: tempfile::TempDir,
        engine: DerivationEngine,
        video: SourceVideo,
        archives: PathBuf,
    }

    fn fixture(fake: FakeTranscoder, duration: Option<f64>, tweak: impl FnOnce(&mut WorkerConfig)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mp4");
        std::fs::write(&source, b"source").unwrap();

        let mut config = WorkerConfig {
            work_dir: dir.path().join("work"),
            ..WorkerConfig::default()
        };
        tweak(&mut config);
        let archives = dir.path().join("archives");

        let mut video = SourceVideo::new(VideoId::from("vid-1"), "source.mp4", "Road Trip.mp4", source, 6);
        video.duration = duration;

        Fixture {
            engine: DerivationEngine::new(Arc::new(fake), Arc::new(JobRegistry::new()), config, archives.clone()),
            video,
            archives,
            _dir: dir,
        }
    }

    fn request(text: &str) -> ProcessRequest {
        ProcessRequest {
            video_id: VideoId::from("vid-1"),
            time_range_text: Some(text.to_string()),
            quality: Quality::High,
            aspect_ratios: vec![AspectRatio::Landscape, AspectRatio::Vertical],
            ..ProcessRequest::default()
        }
    }

    const THREE_RANGES: &str = "0:10-0:20\n0:30-0:40\n1:00-1:15";

    #[tokio::test]
    async fn test_three_ranges_two_ratios_and_stills() {
        let fx = fixture(FakeTranscoder::new(120.0), Some(120.0), |_| {});
        let mut req = request(THREE_RANGES);
        req.generate_stills = true;

        let prepared = fx.engine.prepare(&fx.video, &req).await.unwrap();
        assert_eq!(prepared.handle.snapshot().total_units, 16);

        let outcome = fx.engine.execute(prepared).await.unwrap();
        assert_eq!(outcome.artifacts.len(), 16);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.download_path, "/api/download/vid-1");
        assert_eq!(outcome.archive.file_name, "road_trip_clips.zip");
        assert_eq!(outcome.archive.entries, 16);
        assert!(outcome.archive.path.starts_with(&fx.archives));

        let clips: Vec<_> = outcome
            .artifacts
            .iter()
            .filter(|a| a.category == ArtifactCategory::Clip)
            .filter_map(|a| a.file_name().map(String::from))
            .collect();
        assert_eq!(
            clips,
            vec![
                "road_trip_clip01_16x9.mp4",
                "road_trip_clip01_9x16.mp4",
                "road_trip_clip02_16x9.mp4",
                "road_trip_clip02_9x16.mp4",
                "road_trip_clip03_16x9.mp4",
                "road_trip_clip03_9x16.mp4",
            ]
        );

        let snap = fx.engine.jobs().snapshot(&fx.video.id).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.percent, 100);
        assert_eq!(snap.completed_units, 16);
    }

    #[tokio::test]
    async fn test_failed_pair_is_recorded_and_batch_continues() {
        let fake = FakeTranscoder::new(120.0).fail_when_args_contain("_clip02_9x16");
        let fx = fixture(fake, Some(120.0), |_| {});

        let outcome = fx.engine.process(&fx.video, &request(THREE_RANGES)).await.unwrap();
        assert_eq!(outcome.artifacts.len(), 5);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("Clip 2 (9:16) 00:00:30-00:00:40:"));

        let snap = fx.engine.jobs().snapshot(&fx.video.id).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.completed_units, 6);
    }

    #[tokio::test]
    async fn test_nothing_generated_fails_job() {
        let fake = FakeTranscoder::new(120.0).fail_when_args_contain("libx264");
        let fx = fixture(fake, Some(120.0), |_| {});

        let err = fx.engine.process(&fx.video, &request("0:10-0:20")).await.unwrap_err();
        assert!(matches!(err, WorkerError::NothingGenerated));

        let snap = fx.engine.jobs().snapshot(&fx.video.id).unwrap();
        assert_eq!(snap.status, JobStatus::Error);
        assert!(snap.errors.iter().any(|e| e == "No outputs were generated"));
        assert!(snap.download_path.is_none());
    }

    #[tokio::test]
    async fn test_unknown_duration_is_probed() {
        let fake = Arc::new(FakeTranscoder::new(45.0));
        let fx = fixture(FakeTranscoder::new(45.0), None, |_| {});
        let engine = DerivationEngine::new(
            fake.clone(),
            Arc::new(JobRegistry::new()),
            fx.engine.config().clone(),
            fx.archives.clone(),
        );

        let mut req = request("");
        req.generate_loop = true;
        let prepared = engine.prepare(&fx.video, &req).await.unwrap();
        assert_eq!(fake.probe_count(), 1);
        assert_eq!(prepared.duration, 45.0);
        assert_eq!(prepared.counts.loops, 7);

        let outcome = engine.execute(prepared).await.unwrap();
        assert_eq!(outcome.archive.file_name, "road_trip_loops.zip");
        assert_eq!(outcome.artifacts.len(), 7);
    }

    #[tokio::test]
    async fn test_second_submission_conflicts_while_running() {
        let fx = fixture(FakeTranscoder::new(120.0), Some(120.0), |_| {});
        let first = fx.engine.prepare(&fx.video, &request("0:10-0:20")).await.unwrap();

        let err = fx.engine.prepare(&fx.video, &request("0:10-0:20")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Job(reelcut_jobs::JobError::AlreadyRunning(_))));

        fx.engine.execute(first).await.unwrap();
        assert!(fx.engine.prepare(&fx.video, &request("0:10-0:20")).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_stops_dispatch_and_kills_running_unit() {
        let fake = FakeTranscoder::new(120.0).with_delay(Duration::from_secs(30));
        let fx = fixture(fake, Some(120.0), |_| {});
        let mut req = request(THREE_RANGES);
        req.generate_stills = true;

        let prepared = fx.engine.prepare(&fx.video, &req).await.unwrap();
        let jobs = Arc::clone(fx.engine.jobs());
        let id = fx.video.id.clone();

        let (result, _) = tokio::join!(fx.engine.execute(prepared), async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            jobs.cancel(&id).unwrap();
        });

        assert!(matches!(result, Err(WorkerError::Cancelled)));
        let snap = fx.engine.jobs().snapshot(&fx.video.id).unwrap();
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.errors, vec![CANCELLED_NOTE.to_string()]);
        assert!(snap.outputs.is_empty());
        assert!(!fx.archives.exists());
    }

    #[tokio::test]
    async fn test_shorts_batch_timeout_records_unfinished() {
        let fake = FakeTranscoder::new(60.0).with_delay(Duration::from_millis(500));
        let fx = fixture(fake, Some(60.0), |c| c.shorts_timeout = Duration::from_millis(50));
        let mut req = request("");
        req.generate_shorts = true;

        let err = fx.engine.process(&fx.video, &req).await.unwrap_err();
        assert!(matches!(err, WorkerError::NothingGenerated));

        let snap = fx.engine.jobs().snapshot(&fx.video.id).unwrap();
        let timeouts = snap.errors.iter().filter(|e| e.contains("timed out")).count();
        assert_eq!(timeouts, 5);
        assert_eq!(snap.completed_units, 5);
    }

    #[tokio::test]
    async fn test_missing_source_is_rejected_before_registration() {
        let fx = fixture(FakeTranscoder::new(60.0), Some(60.0), |_| {});
        let mut video = fx.video.clone();
        video.path = PathBuf::from("/nonexistent/source.mp4");

        let err = fx.engine.prepare(&video, &request("0:10-0:20")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Media(MediaError::FileNotFound(_))));
        assert!(fx.engine.jobs().is_empty());
    }
}
