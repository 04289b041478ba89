// Playlist parser: turns raw playlist text into resolved segment references and metadata.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::Error;
use crate::manifest::Resolution;
use crate::manifest::uri::BaseUrl;

static MAP_URI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^#EXT-X-MAP:.*?\bURI="([^"]*)""#).unwrap());

static RESOLUTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bRESOLUTION=(\d+)x(\d+)").unwrap());

static EXTINF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#EXTINF:\s*([^,]*)").unwrap());

/// Result of parsing one playlist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedManifest {
    /// Media segment URLs, absolute, in playlist order
    pub segment_uris: Vec<String>,
    /// Initialization segment URLs, absolute, in playlist order
    pub init_segment_uris: Vec<String>,
    pub is_vod: bool,
    pub resolution: Option<Resolution>,
    /// `None` when the playlist carries no `#EXTINF` tag at all
    pub duration_seconds: Option<f64>,
}

/// Parses playlist text, resolving every reference against `base_url`.
///
/// Every non-blank line that does not start with `#` is a segment reference.
/// Nothing is rejected except a malformed base URL; acceptance policy belongs
/// to the caller.
pub fn parse(content: &str, base_url: &str) -> Result<ParsedManifest, Error> {
    let base = BaseUrl::parse(base_url)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut parsed = ParsedManifest::default();
    let mut duration_total = 0.0_f64;
    let mut saw_duration_tag = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !line.starts_with('#') {
            parsed.segment_uris.push(base.resolve(line));
            continue;
        }

        if let Some(caps) = MAP_URI_REGEX.captures(line) {
            let uri = &caps[1];
            if !uri.trim().is_empty() {
                parsed.init_segment_uris.push(base.resolve(uri));
            }
        }

        if let Some(caps) = EXTINF_REGEX.captures(line) {
            saw_duration_tag = true;
            match caps[1].trim().parse::<f64>() {
                Ok(value) if value.is_finite() && value > 0.0 => duration_total += value,
                _ => trace!(line, "Ignoring unusable segment duration"),
            }
        }

        if parsed.resolution.is_none() {
            if let Some(caps) = RESOLUTION_REGEX.captures(line) {
                if let (Ok(width), Ok(height)) = (caps[1].parse(), caps[2].parse()) {
                    parsed.resolution = Some(Resolution { width, height });
                }
            }
        }

        if is_vod_marker(line) {
            parsed.is_vod = true;
        }
    }

    parsed.duration_seconds = saw_duration_tag.then_some(duration_total);
    Ok(parsed)
}

fn is_vod_marker(line: &str) -> bool {
    let upper = line.to_ascii_uppercase();
    upper == "#EXT-X-ENDLIST"
        || upper
            .strip_prefix("#EXT-X-PLAYLIST-TYPE:")
            .is_some_and(|kind| kind.trim() == "VOD")
}
