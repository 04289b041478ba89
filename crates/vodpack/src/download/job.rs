//! Active download jobs.
//!
//! The registry holds one entry per job from registration until shortly after
//! it finishes, so late status polls still see the terminal phase.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::download::progress::{Phase, ProgressEvent};
use crate::store::ManifestId;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a completed job produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub manifest_id: ManifestId,
    pub archive_filename: String,
    /// Compressed archive size before transport encoding
    pub archive_size: u64,
    /// Segment files included in the archive
    pub files: usize,
    /// Media segments left out after the retry pass
    pub skipped_media: Vec<String>,
}

#[derive(Debug)]
pub enum JobOutcome {
    Complete(JobReport),
    Cancelled,
    Failed(Error),
}

impl JobOutcome {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Complete(_) => Phase::Complete,
            Self::Cancelled => Phase::Cancelled,
            Self::Failed(_) => Phase::Failed,
        }
    }

    pub(crate) fn from_result(result: crate::Result<JobReport>) -> Self {
        match result {
            Ok(report) => Self::Complete(report),
            Err(Error::Cancelled) => Self::Cancelled,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Point-in-time view of one registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub manifest_id: ManifestId,
    pub progress: ProgressEvent,
}

struct JobEntry {
    manifest_id: ManifestId,
    token: CancellationToken,
    status: Arc<RwLock<ProgressEvent>>,
}

impl JobEntry {
    fn is_finished(&self) -> bool {
        self.status.read().phase.is_terminal()
    }
}

/// Registration returned to the job runner.
pub(crate) struct Registration {
    pub id: JobId,
    pub token: CancellationToken,
    pub status: Arc<RwLock<ProgressEvent>>,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job for `manifest_id`, refusing while another unfinished
    /// job for the same manifest exists.
    pub(crate) fn register(&self, manifest_id: ManifestId) -> crate::Result<Registration> {
        let mut jobs = self.jobs.lock();
        if jobs
            .values()
            .any(|job| job.manifest_id == manifest_id && !job.is_finished())
        {
            return Err(Error::JobAlreadyActive { id: manifest_id });
        }

        let id = JobId::new();
        let token = CancellationToken::new();
        let status = Arc::new(RwLock::new(ProgressEvent::new(Phase::Starting)));
        jobs.insert(
            id,
            JobEntry {
                manifest_id,
                token: token.clone(),
                status: status.clone(),
            },
        );
        debug!(job_id = %id, manifest_id = %manifest_id, "Registered download job");

        Ok(Registration { id, token, status })
    }

    /// Signals cancellation. Returns `false` for unknown or finished jobs.
    pub fn cancel(&self, id: &JobId) -> bool {
        let jobs = self.jobs.lock();
        match jobs.get(id) {
            Some(job) if !job.is_finished() => {
                job.token.cancel();
                debug!(job_id = %id, "Cancellation requested");
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, id: &JobId) -> Option<ProgressEvent> {
        self.jobs.lock().get(id).map(|job| job.status.read().clone())
    }

    pub fn active(&self) -> Vec<JobSummary> {
        self.jobs
            .lock()
            .iter()
            .map(|(id, job)| JobSummary {
                id: *id,
                manifest_id: job.manifest_id,
                progress: job.status.read().clone(),
            })
            .collect()
    }

    pub fn remove(&self, id: &JobId) -> bool {
        self.jobs.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

/// Handle to a spawned job.
pub struct JobHandle {
    id: JobId,
    manifest_id: ManifestId,
    token: CancellationToken,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(
        id: JobId,
        manifest_id: ManifestId,
        token: CancellationToken,
        task: JoinHandle<JobOutcome>,
    ) -> Self {
        Self {
            id,
            manifest_id,
            token,
            task,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn manifest_id(&self) -> ManifestId {
        self.manifest_id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A clone of the job's token, e.g. for wiring up a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> JobOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed(Error::Internal {
                reason: format!("download task failed: {e}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_unfinished_job_per_manifest() {
        let registry = JobRegistry::new();
        let manifest = ManifestId::new();

        let first = registry.register(manifest).unwrap();
        assert!(matches!(
            registry.register(manifest),
            Err(Error::JobAlreadyActive { .. })
        ));

        first.status.write().phase = Phase::Complete;
        assert!(registry.register(manifest).is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn cancel_fires_token_once_running() {
        let registry = JobRegistry::new();
        let job = registry.register(ManifestId::new()).unwrap();

        assert!(registry.cancel(&job.id));
        assert!(job.token.is_cancelled());

        job.status.write().phase = Phase::Cancelled;
        assert!(!registry.cancel(&job.id));
        assert!(!registry.cancel(&JobId::new()));
    }

    #[test]
    fn status_and_removal() {
        let registry = JobRegistry::new();
        let job = registry.register(ManifestId::new()).unwrap();
        job.status.write().units_total = 7;

        assert_eq!(registry.status(&job.id).unwrap().units_total, 7);
        assert_eq!(registry.active().len(), 1);
        assert!(registry.remove(&job.id));
        assert!(registry.status(&job.id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn outcome_maps_cancellation_out_of_errors() {
        assert!(matches!(
            JobOutcome::from_result(Err(Error::Cancelled)),
            JobOutcome::Cancelled
        ));
        let failed = JobOutcome::from_result(Err(Error::archive("boom")));
        assert_eq!(failed.phase(), Phase::Failed);
    }
}
