use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;
use vodpack_engine::{ArchiveResult, ArchiveSink};

/// Writes finished archives into a directory.
pub struct FileArchiveSink {
    output_dir: PathBuf,
    keep_encoded: bool,
    written: Mutex<Vec<PathBuf>>,
}

impl FileArchiveSink {
    pub fn new(output_dir: impl Into<PathBuf>, keep_encoded: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            keep_encoded,
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn written(&self) -> Vec<PathBuf> {
        self.written.lock().clone()
    }

    /// Picks `name`, or `name (n)` when the file already exists.
    fn available_path(dir: &Path, name: &str) -> PathBuf {
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (name, String::new()),
        };
        (1..)
            .map(|n| dir.join(format!("{stem} ({n}){ext}")))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

#[async_trait]
impl ArchiveSink for FileArchiveSink {
    async fn deliver(&self, archive: ArchiveResult) -> vodpack_engine::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let (name, contents) = if self.keep_encoded {
            (
                format!("{}.b64", archive.filename),
                archive.encoded.into_bytes(),
            )
        } else {
            let bytes = archive.decode()?;
            (archive.filename, bytes)
        };

        let path = Self::available_path(&self.output_dir, &name);
        tokio::fs::write(&path, &contents).await?;
        info!(path = %path.display(), bytes = contents.len(), "Archive written");
        self.written.lock().push(path);
        Ok(())
    }
}
