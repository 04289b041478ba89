//! Session facade: owns the manifest store and the job table and runs
//! download jobs end to end.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveBuilder, ArchiveRequest, ArchiveSink};
use crate::client::create_client;
use crate::config::VodpackConfig;
use crate::download::job::{JobHandle, JobId, JobOutcome, JobRegistry, JobReport, JobSummary};
use crate::download::orchestrator::DownloadOrchestrator;
use crate::download::progress::{ProgressEvent, ProgressSink, ProgressTracker};
use crate::download::{HttpSegmentFetcher, SegmentFetcher, build_references};
use crate::manifest;
use crate::store::{Capture, ManifestId, ManifestStore, ManifestSummary, PlaylistManifest};
use crate::{Error, Result};

pub struct Session {
    config: Arc<VodpackConfig>,
    fetcher: Arc<dyn SegmentFetcher>,
    store: Mutex<ManifestStore>,
    jobs: Arc<JobRegistry>,
}

impl Session {
    pub fn new(config: VodpackConfig, fetcher: Arc<dyn SegmentFetcher>) -> Result<Self> {
        config.validate()?;
        let store = ManifestStore::new(config.store.max_manifests);
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            store: Mutex::new(store),
            jobs: Arc::new(JobRegistry::new()),
        })
    }

    /// Session backed by [`HttpSegmentFetcher`] built from `config.http`.
    pub fn with_http(config: VodpackConfig) -> Result<Self> {
        let client = create_client(&config.http)?;
        let fetcher =
            HttpSegmentFetcher::new(client).with_request_timeout(config.download.request_timeout);
        Self::new(config, Arc::new(fetcher))
    }

    pub fn config(&self) -> &VodpackConfig {
        &self.config
    }

    /// Parses `raw`, applies the capture policy and upserts the result.
    pub fn ingest(&self, raw: &str, source_url: &str, title: Option<&str>) -> Result<Capture> {
        let parsed = manifest::parse(raw, source_url)?;
        let policy = &self.config.capture;

        if parsed.segment_uris.is_empty() {
            debug!(source_url, "Ignoring playlist without segments");
            return Err(Error::EmptyManifest {
                source_url: source_url.to_string(),
            });
        }
        if policy.require_vod && !parsed.is_vod {
            debug!(source_url, "Rejecting playlist that is not VOD");
            return Err(Error::rejected("playlist is not marked as VOD"));
        }
        if parsed.segment_uris.len() < policy.min_segments {
            debug!(
                source_url,
                segments = parsed.segment_uris.len(),
                min_segments = policy.min_segments,
                "Rejecting playlist with too few segments"
            );
            return Err(Error::rejected(format!(
                "playlist has {} segments, at least {} required",
                parsed.segment_uris.len(),
                policy.min_segments
            )));
        }

        self.store.lock().capture(source_url, raw, title, parsed)
    }

    pub fn manifests(&self) -> Vec<ManifestSummary> {
        self.store.lock().summaries()
    }

    pub fn manifest(&self, id: &ManifestId) -> Option<PlaylistManifest> {
        self.store.lock().get(id).cloned()
    }

    pub fn remove_manifest(&self, id: &ManifestId) -> Option<PlaylistManifest> {
        self.store.lock().remove(id)
    }

    /// Starts a download job for a stored manifest on the current tokio runtime.
    pub fn download(
        &self,
        manifest_id: ManifestId,
        archive_sink: Arc<dyn ArchiveSink>,
        progress_sink: Arc<dyn ProgressSink>,
    ) -> Result<JobHandle> {
        let manifest = self
            .manifest(&manifest_id)
            .ok_or(Error::ManifestNotFound { id: manifest_id })?;
        let registration = self.jobs.register(manifest_id)?;
        let job_id = registration.id;
        let token = registration.token.clone();
        let tracker = Arc::new(ProgressTracker::new(progress_sink, registration.status));

        info!(
            job_id = %job_id,
            manifest_id = %manifest_id,
            segments = manifest.segment_uris.len(),
            "Starting download job"
        );

        let config = self.config.clone();
        let fetcher = self.fetcher.clone();
        let jobs = self.jobs.clone();
        let job_token = token.clone();
        let task = tokio::spawn(async move {
            let result = execute_job(
                &config,
                fetcher,
                manifest,
                archive_sink,
                tracker.clone(),
                job_token,
            )
            .await;
            let outcome = JobOutcome::from_result(result);

            let archive_size = match &outcome {
                JobOutcome::Complete(report) => {
                    info!(
                        job_id = %job_id,
                        archive = %report.archive_filename,
                        size = report.archive_size,
                        skipped = report.skipped_media.len(),
                        "Download job complete"
                    );
                    Some(report.archive_size)
                }
                JobOutcome::Cancelled => {
                    info!(job_id = %job_id, "Download job cancelled");
                    None
                }
                JobOutcome::Failed(err) => {
                    error!(job_id = %job_id, error = %err, "Download job failed");
                    None
                }
            };
            tracker.finish(outcome.phase(), archive_size);

            let linger = config.jobs.finished_job_linger;
            tokio::spawn(async move {
                tokio::time::sleep(linger).await;
                jobs.remove(&job_id);
            });

            outcome
        });

        Ok(JobHandle::new(job_id, manifest_id, token, task))
    }

    /// Runs a download job to completion.
    pub async fn run(
        &self,
        manifest_id: ManifestId,
        archive_sink: Arc<dyn ArchiveSink>,
        progress_sink: Arc<dyn ProgressSink>,
    ) -> Result<JobOutcome> {
        let handle = self.download(manifest_id, archive_sink, progress_sink)?;
        Ok(handle.wait().await)
    }

    pub fn cancel(&self, job_id: &JobId) -> bool {
        self.jobs.cancel(job_id)
    }

    pub fn job_status(&self, job_id: &JobId) -> Option<ProgressEvent> {
        self.jobs.status(job_id)
    }

    pub fn active_jobs(&self) -> Vec<JobSummary> {
        self.jobs.active()
    }
}

async fn execute_job(
    config: &VodpackConfig,
    fetcher: Arc<dyn SegmentFetcher>,
    manifest: PlaylistManifest,
    archive_sink: Arc<dyn ArchiveSink>,
    tracker: Arc<ProgressTracker>,
    token: CancellationToken,
) -> Result<JobReport> {
    let references = build_references(
        &manifest.init_segment_uris,
        &manifest.segment_uris,
        &config.download.default_segment_name,
    );

    let orchestrator = DownloadOrchestrator::new(fetcher, config.download.clone());
    let output = orchestrator.run(&references, &tracker, &token).await?;
    if !output.skipped_media.is_empty() {
        warn!(
            manifest_id = %manifest.id,
            skipped = output.skipped_media.len(),
            "Archiving without some media segments"
        );
    }

    let files = output.files.len();
    let request = ArchiveRequest {
        display_name: manifest.display_name(),
        raw_manifest: manifest.raw_content,
        source_url: manifest.source_url,
        names: references
            .into_iter()
            .map(|r| (r.url, r.filename))
            .collect(),
        files: output.files,
    };

    let archive = ArchiveBuilder::new(config.archive.clone())
        .build(request, tracker, token.clone())
        .await?;
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let report = JobReport {
        manifest_id: manifest.id,
        archive_filename: archive.filename.clone(),
        archive_size: archive.size,
        files,
        skipped_media: output.skipped_media,
    };
    archive_sink.deliver(archive).await?;
    Ok(report)
}
