// Zip assembly. Runs on a blocking thread; checks the token between entries and
// between write chunks so a cancelled job stops compressing promptly.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::{Error, Result};

/// Bytes handed to the compressor per write call.
pub const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// One file inside the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Bytes,
    /// Unix permission bits, `None` for the default
    pub mode: Option<u32>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mode: None,
        }
    }

    pub fn executable(mut self) -> Self {
        self.mode = Some(0o755);
        self
    }
}

/// Compresses `entries` into an in-memory zip.
///
/// Entries sharing a name are collapsed: the later one wins.
pub fn build_zip(
    entries: &[ArchiveEntry],
    compression_level: u8,
    token: &CancellationToken,
) -> Result<Vec<u8>> {
    build_zip_with(entries, compression_level, token, |_| {})
}

/// [`build_zip`] with a callback after each entry is written.
pub(crate) fn build_zip_with(
    entries: &[ArchiveEntry],
    compression_level: u8,
    token: &CancellationToken,
    mut on_entry: impl FnMut(&ArchiveEntry),
) -> Result<Vec<u8>> {
    let options = if compression_level == 0 {
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored)
    } else {
        SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(compression_level as i64))
    };

    let capacity = entries.iter().map(|e| e.data.len()).sum::<usize>() / 2;
    let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(capacity)));

    let last_index: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.name.as_str(), i))
        .collect();

    for (index, entry) in entries.iter().enumerate() {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if last_index[entry.name.as_str()] != index {
            warn!(name = %entry.name, "Duplicate archive entry, keeping the later file");
            continue;
        }

        let entry_options = match entry.mode {
            Some(mode) => options.unix_permissions(mode),
            None => options,
        };
        zip.start_file(entry.name.as_str(), entry_options)?;

        for chunk in entry.data.chunks(WRITE_CHUNK_SIZE) {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            zip.write_all(chunk)?;
        }
        trace!(name = %entry.name, bytes = entry.data.len(), "Added archive entry");
        on_entry(entry);
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
