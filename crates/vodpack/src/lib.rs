//! Playlist capture, segment download and archive packaging.
//!
//! A [`Session`] accepts raw playlist text, keeps a bounded table of captured
//! manifests and turns any of them into a single zip archive containing the
//! segments, a rewritten playlist and a build script.

pub mod archive;
pub mod builder;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod session;
pub mod store;

pub use archive::{ArchiveResult, ArchiveSink};
pub use builder::VodpackConfigBuilder;
pub use client::{create_client, fetch_playlist};
pub use config::{
    ArchiveConfig, CapturePolicy, DownloadConfig, HttpConfig, JobConfig, StoreConfig,
    VodpackConfig,
};
pub use download::{
    ChannelProgress, HttpSegmentFetcher, JobHandle, JobId, JobOutcome, JobReport, JobSummary,
    NoopProgress, Phase, ProgressEvent, ProgressSink, SegmentFetcher,
};
pub use error::{Error, FetchError, Result};
pub use manifest::{ParsedManifest, Resolution, VariantSelectionPolicy, select_variant};
pub use session::Session;
pub use store::{Capture, ManifestId, ManifestSummary, PlaylistManifest};
