//! Session table of captured manifests.
//!
//! Captures are upserts keyed by a dedup key; the table is bounded and evicts
//! in first-capture order once the bound is exceeded.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::manifest::{ParsedManifest, Resolution, strip_query};
use crate::naming::manifest_filename;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ManifestId(Uuid);

impl ManifestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ManifestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ManifestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ManifestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistManifest {
    pub id: ManifestId,
    pub source_url: String,
    pub raw_content: String,
    pub title: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub resolution: Option<Resolution>,
    pub duration_seconds: Option<f64>,
    pub segment_uris: Vec<String>,
    pub init_segment_uris: Vec<String>,
}

impl PlaylistManifest {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(
            self.title.as_deref(),
            self.segment_uris.len(),
            &self.source_url,
        )
    }

    /// Title when known, otherwise the playlist filename from the source URL.
    pub fn display_name(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => manifest_filename(&self.source_url, "playlist.m3u8"),
        }
    }

    pub fn summary(&self) -> ManifestSummary {
        ManifestSummary {
            id: self.id,
            display_name: self.display_name(),
            source_url: self.source_url.clone(),
            segment_count: self.segment_uris.len(),
            captured_at: self.captured_at,
            resolution: self.resolution,
            duration_seconds: self.duration_seconds,
        }
    }
}

/// Identity used to recognise the same stream across captures.
///
/// A known title plus segment count is preferred; signed URLs rotate their
/// query between requests, so the fallback ignores the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Titled { title: String, segment_count: usize },
    Source(String),
}

impl DedupKey {
    pub fn new(title: Option<&str>, segment_count: usize, source_url: &str) -> Self {
        match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => Self::Titled {
                title: title.to_string(),
                segment_count,
            },
            None => Self::Source(strip_query(source_url).to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestSummary {
    pub id: ManifestId,
    pub display_name: String,
    pub source_url: String,
    pub segment_count: usize,
    pub captured_at: DateTime<Utc>,
    pub resolution: Option<Resolution>,
    pub duration_seconds: Option<f64>,
}

/// Outcome of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub id: ManifestId,
    /// `true` when an existing entry was updated in place
    pub updated: bool,
}

struct Entry {
    manifest: PlaylistManifest,
    /// Monotonic capture counter, bumped on every upsert
    last_capture: u64,
}

pub struct ManifestStore {
    max_entries: usize,
    /// First-capture order, oldest at the front
    order: VecDeque<ManifestId>,
    entries: HashMap<ManifestId, Entry>,
    index: HashMap<DedupKey, ManifestId>,
    capture_counter: u64,
}

impl ManifestStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
            index: HashMap::new(),
            capture_counter: 0,
        }
    }

    /// Inserts a new manifest or updates the entry sharing its dedup key.
    pub fn capture(
        &mut self,
        source_url: &str,
        raw_content: &str,
        title: Option<&str>,
        parsed: ParsedManifest,
    ) -> Result<Capture> {
        if parsed.segment_uris.is_empty() {
            return Err(Error::EmptyManifest {
                source_url: source_url.to_string(),
            });
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let key = DedupKey::new(title.as_deref(), parsed.segment_uris.len(), source_url);
        self.capture_counter += 1;
        let now = Utc::now();

        if let Some(&id) = self.index.get(&key) {
            if let Some(entry) = self.entries.get_mut(&id) {
                let manifest = &mut entry.manifest;
                manifest.source_url = source_url.to_string();
                manifest.raw_content = raw_content.to_string();
                manifest.title = title;
                manifest.captured_at = now;
                manifest.resolution = parsed.resolution;
                manifest.duration_seconds = parsed.duration_seconds;
                manifest.segment_uris = parsed.segment_uris;
                manifest.init_segment_uris = parsed.init_segment_uris;
                entry.last_capture = self.capture_counter;
                debug!(manifest_id = %id, "Updated existing manifest capture");
                return Ok(Capture { id, updated: true });
            }
        }

        let id = ManifestId::new();
        let manifest = PlaylistManifest {
            id,
            source_url: source_url.to_string(),
            raw_content: raw_content.to_string(),
            title,
            captured_at: now,
            resolution: parsed.resolution,
            duration_seconds: parsed.duration_seconds,
            segment_uris: parsed.segment_uris,
            init_segment_uris: parsed.init_segment_uris,
        };
        info!(
            manifest_id = %id,
            segments = manifest.segment_uris.len(),
            init_segments = manifest.init_segment_uris.len(),
            "Captured new manifest"
        );

        self.index.insert(key, id);
        self.order.push_back(id);
        self.entries.insert(
            id,
            Entry {
                manifest,
                last_capture: self.capture_counter,
            },
        );
        self.evict_overflow();

        Ok(Capture { id, updated: false })
    }

    fn evict_overflow(&mut self) {
        while self.order.len() > self.max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                let key = entry.manifest.dedup_key();
                if self.index.get(&key) == Some(&oldest) {
                    self.index.remove(&key);
                }
                debug!(manifest_id = %oldest, "Evicted oldest manifest");
            }
        }
    }

    pub fn get(&self, id: &ManifestId) -> Option<&PlaylistManifest> {
        self.entries.get(id).map(|e| &e.manifest)
    }

    pub fn remove(&mut self, id: &ManifestId) -> Option<PlaylistManifest> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|x| x != id);
        let key = entry.manifest.dedup_key();
        if self.index.get(&key) == Some(id) {
            self.index.remove(&key);
        }
        Some(entry.manifest)
    }

    /// One summary per dedup key, most recently captured first.
    pub fn summaries(&self) -> Vec<ManifestSummary> {
        let mut entries: Vec<&Entry> = self
            .entries
            .values()
            .filter(|e| !e.manifest.segment_uris.is_empty())
            .collect();
        entries.sort_by(|a, b| b.last_capture.cmp(&a.last_capture));

        let mut seen = HashSet::with_capacity(entries.len());
        entries
            .into_iter()
            .filter(|e| seen.insert(e.manifest.dedup_key()))
            .map(|e| e.manifest.summary())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(count: usize) -> ParsedManifest {
        ParsedManifest {
            segment_uris: (0..count)
                .map(|i| format!("https://cdn.test/v/seg{i}.ts"))
                .collect(),
            is_vod: true,
            ..Default::default()
        }
    }

    #[test]
    fn same_title_and_count_updates_in_place() {
        let mut store = ManifestStore::new(10);
        let first = store
            .capture("https://a.test/1.m3u8?sig=1", "v1", Some("Movie"), parsed(3))
            .unwrap();
        let second = store
            .capture("https://b.test/2.m3u8?sig=2", "v2", Some("Movie"), parsed(3))
            .unwrap();

        assert!(!first.updated);
        assert!(second.updated);
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);

        let manifest = store.get(&first.id).unwrap();
        assert_eq!(manifest.raw_content, "v2");
        assert_eq!(manifest.source_url, "https://b.test/2.m3u8?sig=2");
    }

    #[test]
    fn same_title_different_count_is_distinct() {
        let mut store = ManifestStore::new(10);
        store.capture("https://a.test/1.m3u8", "", Some("Movie"), parsed(3)).unwrap();
        store.capture("https://a.test/1.m3u8", "", Some("Movie"), parsed(4)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn untitled_captures_dedup_by_url_without_query() {
        let mut store = ManifestStore::new(10);
        let a = store
            .capture("https://a.test/v/index.m3u8?token=1", "", None, parsed(2))
            .unwrap();
        let b = store
            .capture("https://a.test/v/index.m3u8?token=2", "", Some("  "), parsed(5))
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.get(&a.id).unwrap().segment_uris.len(), 5);
    }

    #[test]
    fn empty_manifest_is_never_retained() {
        let mut store = ManifestStore::new(10);
        let err = store
            .capture("https://a.test/x.m3u8", "", None, parsed(0))
            .unwrap_err();
        assert!(matches!(err, Error::EmptyManifest { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn eviction_keeps_most_recent_entries() {
        let mut store = ManifestStore::new(3);
        let ids: Vec<ManifestId> = (0..7)
            .map(|i| {
                store
                    .capture(&format!("https://a.test/{i}.m3u8"), "", None, parsed(1))
                    .unwrap()
                    .id
            })
            .collect();

        assert_eq!(store.len(), 3);
        for id in &ids[..4] {
            assert!(store.get(id).is_none());
        }
        for id in &ids[4..] {
            assert!(store.get(id).is_some());
        }
    }

    #[test]
    fn update_does_not_refresh_eviction_position() {
        let mut store = ManifestStore::new(2);
        let first = store.capture("https://a.test/a.m3u8", "", None, parsed(1)).unwrap();
        store.capture("https://a.test/b.m3u8", "", None, parsed(1)).unwrap();
        store.capture("https://a.test/a.m3u8", "", None, parsed(1)).unwrap();
        store.capture("https://a.test/c.m3u8", "", None, parsed(1)).unwrap();

        assert!(store.get(&first.id).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn evicted_key_can_be_captured_again() {
        let mut store = ManifestStore::new(1);
        let a = store.capture("https://a.test/a.m3u8", "", None, parsed(1)).unwrap();
        store.capture("https://a.test/b.m3u8", "", None, parsed(1)).unwrap();
        let again = store.capture("https://a.test/a.m3u8", "", None, parsed(1)).unwrap();
        assert!(!again.updated);
        assert_ne!(a.id, again.id);
    }

    #[test]
    fn summaries_are_newest_first_and_unique() {
        let mut store = ManifestStore::new(10);
        let a = store.capture("https://a.test/a.m3u8", "", Some("A"), parsed(2)).unwrap();
        let b = store.capture("https://a.test/b.m3u8", "", None, parsed(1)).unwrap();
        store.capture("https://a.test/a2.m3u8", "", Some("A"), parsed(2)).unwrap();

        let summaries = store.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, a.id);
        assert_eq!(summaries[0].display_name, "A");
        assert_eq!(summaries[1].id, b.id);
        assert_eq!(summaries[1].display_name, "b.m3u8");
    }

    #[test]
    fn remove_and_clear() {
        let mut store = ManifestStore::new(10);
        let a = store.capture("https://a.test/a.m3u8", "", None, parsed(1)).unwrap();
        store.capture("https://a.test/b.m3u8", "", None, parsed(1)).unwrap();

        assert!(store.remove(&a.id).is_some());
        assert!(store.remove(&a.id).is_none());
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
        assert!(store.summaries().is_empty());
    }
}
