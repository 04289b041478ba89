//! Archive packaging: manifest rewrite, build script, zip and transport encoding.

pub mod builder;
pub mod encoder;
pub mod rewrite;
pub mod script;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ArchiveConfig;
use crate::download::progress::ProgressTracker;
use crate::naming::sanitize_filename;
use crate::{Error, Result};

pub use builder::{ArchiveEntry, build_zip};
pub use encoder::encode_chunked;
pub use rewrite::rewrite_manifest;
pub use script::render_build_script;

/// Finished archive, ready for the output sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveResult {
    /// Base64 of the zip archive
    pub encoded: String,
    pub filename: String,
    /// Size of the zip archive before encoding
    pub size: u64,
}

impl ArchiveResult {
    /// Decodes the transport encoding back into zip bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&self.encoded)
            .map_err(|e| Error::archive(format!("invalid archive encoding: {e}")))
    }
}

/// Receives the finished archive.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn deliver(&self, archive: ArchiveResult) -> Result<()>;
}

/// Everything needed to package one manifest.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub raw_manifest: String,
    pub source_url: String,
    /// Human name used for the archive and the remuxed output
    pub display_name: String,
    /// Resolved URL to local filename
    pub names: HashMap<String, String>,
    /// Downloaded files in reference order
    pub files: Vec<(String, Bytes)>,
}

pub struct ArchiveBuilder {
    config: ArchiveConfig,
}

impl ArchiveBuilder {
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    /// Archive stem derived from a display name, without extension.
    fn stem(&self, display_name: &str) -> String {
        let name = sanitize_filename(display_name);
        let stem = match name.rsplit_once('.') {
            Some((stem, ext)) if ext.eq_ignore_ascii_case("m3u8") => stem.to_string(),
            _ => name,
        };
        if stem.is_empty() {
            "archive".to_string()
        } else {
            stem
        }
    }

    /// Assembles the entry list: manifest, segment files, build script.
    pub fn entries(&self, request: &ArchiveRequest) -> Result<Vec<ArchiveEntry>> {
        let manifest_name = crate::naming::manifest_filename(
            &request.source_url,
            &self.config.default_manifest_name,
        );
        let manifest =
            rewrite_manifest(&request.raw_manifest, &request.source_url, &request.names)?;
        let output_name = format!(
            "{}.{}",
            self.stem(&request.display_name),
            self.config.output_extension
        );
        let script = render_build_script(&manifest_name, &output_name);

        let mut entries = Vec::with_capacity(request.files.len() + 2);
        entries.push(ArchiveEntry::new(manifest_name, manifest));
        entries.extend(
            request
                .files
                .iter()
                .map(|(name, data)| ArchiveEntry::new(name.clone(), data.clone())),
        );
        entries.push(ArchiveEntry::new(self.config.script_name.clone(), script).executable());
        Ok(entries)
    }

    /// Compresses and encodes on a blocking thread.
    pub async fn build(
        &self,
        request: ArchiveRequest,
        tracker: Arc<ProgressTracker>,
        token: CancellationToken,
    ) -> Result<ArchiveResult> {
        let entries = self.entries(&request)?;
        let filename = format!("{}.zip", self.stem(&request.display_name));
        let level = self.config.compression_level;
        let chunk_size = self.config.encode_chunk_size;
        debug!(entries = entries.len(), level, "Building archive");

        let (encoded, size) = tokio::task::spawn_blocking(move || -> Result<(String, u64)> {
            let zip = build_zip(&entries, level, &token)?;
            drop(entries);
            let size = zip.len() as u64;
            let encoded = encode_chunked(&zip, chunk_size, &token, |done, total, bytes_done| {
                tracker.archiving(done, total, bytes_done, size)
            })?;
            Ok((encoded, size))
        })
        .await
        .map_err(|e| Error::Internal {
            reason: format!("archive task failed: {e}"),
        })??;

        info!(filename = %filename, size, "Archive built");
        Ok(ArchiveResult {
            encoded,
            filename,
            size,
        })
    }
}
