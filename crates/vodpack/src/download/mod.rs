//! Segment download: fetching, progress reporting, batching with retry, and
//! the per-session job table.

pub mod fetcher;
pub mod job;
pub mod orchestrator;
pub mod progress;

use std::collections::HashSet;

use serde::Serialize;

use crate::naming;

pub use fetcher::{HttpSegmentFetcher, SegmentFetcher};
pub use job::{JobHandle, JobId, JobOutcome, JobRegistry, JobReport, JobSummary};
pub use orchestrator::{DownloadOrchestrator, DownloadOutput};
pub use progress::{ChannelProgress, NoopProgress, Phase, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Init,
    Media,
}

/// One unit of download work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReference {
    pub url: String,
    /// Local filename, unique within the reference set
    pub filename: String,
    pub kind: SegmentKind,
}

impl SegmentReference {
    pub fn is_init(&self) -> bool {
        self.kind == SegmentKind::Init
    }
}

/// Builds the reference set for a manifest: init segments first, then media,
/// each distinct URL once, names assigned over the whole set.
pub fn build_references(
    init_segment_uris: &[String],
    segment_uris: &[String],
    default_name: &str,
) -> Vec<SegmentReference> {
    let mut seen = HashSet::new();
    let ordered: Vec<(&String, SegmentKind)> = init_segment_uris
        .iter()
        .map(|url| (url, SegmentKind::Init))
        .chain(segment_uris.iter().map(|url| (url, SegmentKind::Media)))
        .filter(|(url, _)| seen.insert(url.as_str()))
        .collect();

    let urls: Vec<String> = ordered.iter().map(|(url, _)| (*url).clone()).collect();
    let names = naming::resolve(&urls, default_name);

    ordered
        .into_iter()
        .map(|(url, kind)| SegmentReference {
            filename: names
                .get(url)
                .cloned()
                .unwrap_or_else(|| default_name.to_string()),
            url: url.clone(),
            kind,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_segments_come_first_and_duplicates_collapse() {
        let init = vec!["https://a.com/v/init.mp4".to_string()];
        let media = vec![
            "https://a.com/v/1.m4s".to_string(),
            "https://a.com/v/2.m4s".to_string(),
            "https://a.com/v/1.m4s".to_string(),
        ];
        let refs = build_references(&init, &media, "segment");

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].kind, SegmentKind::Init);
        assert_eq!(refs[0].filename, "init.mp4");
        assert_eq!(refs[1].filename, "1.m4s");
        assert_eq!(refs[2].filename, "2.m4s");
        assert!(refs[1..].iter().all(|r| !r.is_init()));
    }

    #[test]
    fn names_are_resolved_across_init_and_media() {
        let init = vec!["https://a.com/hd/seg.mp4".to_string()];
        let media = vec!["https://a.com/sd/seg.mp4".to_string()];
        let refs = build_references(&init, &media, "segment");

        assert_eq!(refs[0].filename, "hd__seg.mp4");
        assert_eq!(refs[1].filename, "sd__seg.mp4");
    }
}
