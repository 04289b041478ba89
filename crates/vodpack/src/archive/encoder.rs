// Chunked base64 transport encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Encodes `data` as standard padded base64, `chunk_size` input bytes at a
/// time, calling `on_chunk(done, total, bytes_done)` after each chunk.
///
/// `chunk_size` must be a positive multiple of 3 so that concatenated chunk
/// encodings equal the encoding of the whole buffer.
pub fn encode_chunked<F>(
    data: &[u8],
    chunk_size: usize,
    token: &CancellationToken,
    mut on_chunk: F,
) -> Result<String>
where
    F: FnMut(usize, usize, u64),
{
    if chunk_size == 0 || chunk_size % 3 != 0 {
        return Err(Error::configuration(format!(
            "encode chunk size {chunk_size} is not a positive multiple of 3"
        )));
    }

    let total = data.len().div_ceil(chunk_size);
    let mut out = String::with_capacity(base64::encoded_len(data.len(), true).unwrap_or(0));
    let mut bytes_done = 0u64;

    for (index, chunk) in data.chunks(chunk_size).enumerate() {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        STANDARD.encode_string(chunk, &mut out);
        bytes_done += chunk.len() as u64;
        on_chunk(index + 1, total, bytes_done);
    }

    Ok(out)
}
