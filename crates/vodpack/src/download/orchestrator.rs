// Download orchestrator: batched concurrent fetching with a single retry pass.
//
// Init segments go first, then media, each in fixed-size batches. Every unit
// that failed in the first pass is retried exactly once with a smaller batch.
// Init segments that still fail abort the job; media segments are skipped.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::download::SegmentReference;
use crate::download::fetcher::SegmentFetcher;
use crate::download::progress::ProgressTracker;
use crate::{Error, FetchError, Result};

/// Successful downloads in reference order, plus the media that was given up on.
#[derive(Debug, Default)]
pub struct DownloadOutput {
    pub files: Vec<(String, Bytes)>,
    /// URLs of media segments that failed after the retry pass
    pub skipped_media: Vec<String>,
}

pub struct DownloadOrchestrator {
    fetcher: Arc<dyn SegmentFetcher>,
    config: DownloadConfig,
}

/// Outcome bookkeeping for one pass.
#[derive(Default)]
struct PassState {
    completed: HashMap<usize, Bytes>,
    failed: Vec<(usize, FetchError)>,
}

impl DownloadOrchestrator {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, config: DownloadConfig) -> Self {
        Self { fetcher, config }
    }

    /// Downloads every reference. Returns [`Error::Cancelled`] as soon as the
    /// token is observed, and [`Error::FatalFetch`] when an init segment
    /// cannot be fetched after the retry pass.
    pub async fn run(
        &self,
        references: &[SegmentReference],
        tracker: &ProgressTracker,
        token: &CancellationToken,
    ) -> Result<DownloadOutput> {
        tracker.starting(references.len());

        let (init, media): (Vec<usize>, Vec<usize>) =
            (0..references.len()).partition(|&i| references[i].is_init());
        debug!(
            init_segments = init.len(),
            media_segments = media.len(),
            batch_size = self.config.batch_size,
            "Starting segment download"
        );

        let mut state = PassState::default();
        let batch_size = self.config.batch_size;
        self.fetch_pass(references, &init, batch_size, &mut state, tracker, token)
            .await?;
        self.fetch_pass(references, &media, batch_size, &mut state, tracker, token)
            .await?;

        if !state.failed.is_empty() {
            let retry: Vec<usize> = state.failed.drain(..).map(|(i, _)| i).collect();
            info!(
                failed = retry.len(),
                retry_batch_size = self.config.retry_batch_size,
                "Retrying failed segments"
            );

            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !self.config.retry_delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(self.config.retry_delay) => {}
                }
            }

            self.fetch_pass(
                references,
                &retry,
                self.config.retry_batch_size,
                &mut state,
                tracker,
                token,
            )
            .await?;
        }

        let mut skipped_media = Vec::new();
        for (index, err) in &state.failed {
            let reference = &references[*index];
            if reference.is_init() {
                return Err(Error::FatalFetch {
                    url: reference.url.clone(),
                    reason: err.to_string(),
                });
            }
            warn!(url = %reference.url, error = %err, "Skipping media segment after retry");
            skipped_media.push(reference.url.clone());
        }

        let files = references
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                state
                    .completed
                    .remove(&i)
                    .map(|bytes| (r.filename.clone(), bytes))
            })
            .collect::<Vec<_>>();

        info!(
            downloaded = files.len(),
            skipped = skipped_media.len(),
            "Segment download finished"
        );
        Ok(DownloadOutput {
            files,
            skipped_media,
        })
    }

    async fn fetch_pass(
        &self,
        references: &[SegmentReference],
        indices: &[usize],
        batch_size: usize,
        state: &mut PassState,
        tracker: &ProgressTracker,
        token: &CancellationToken,
    ) -> Result<()> {
        for batch in indices.chunks(batch_size.max(1)) {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Units report progress as they land; the batch still waits for all.
            let fetches = batch.iter().map(|&index| {
                let url = references[index].url.as_str();
                async move {
                    let result = self.fetcher.fetch(url, token).await;
                    if let Ok(bytes) = &result {
                        tracker.unit_completed(bytes.len() as u64);
                    }
                    (index, result)
                }
            });

            let mut cancelled = false;
            for (index, result) in join_all(fetches).await {
                match result {
                    Ok(bytes) => {
                        state.completed.insert(index, bytes);
                    }
                    Err(FetchError::Cancelled) => cancelled = true,
                    Err(err) => {
                        debug!(url = %references[index].url, error = %err, "Segment fetch failed");
                        state.failed.push((index, err));
                    }
                }
            }

            if cancelled || token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }
}
