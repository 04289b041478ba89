// Master playlist handling: picks one rendition before the media playlist is captured.

use m3u8_rs::{Playlist, VariantStream, parse_playlist_res};
use tracing::debug;

use crate::Error;
use crate::manifest::uri::BaseUrl;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VariantSelectionPolicy {
    #[default]
    HighestBandwidth,
    LowestBandwidth,
    MatchingResolution {
        width: u64,
        height: u64,
    },
}

/// Returns the absolute URL of the selected variant when `content` is a master
/// playlist, or `None` for anything else (media playlists, unparseable text).
pub fn select_variant(
    content: &str,
    base_url: &str,
    policy: &VariantSelectionPolicy,
) -> Result<Option<String>, Error> {
    let master = match parse_playlist_res(content.as_bytes()) {
        Ok(Playlist::MasterPlaylist(master)) => master,
        Ok(Playlist::MediaPlaylist(_)) | Err(_) => return Ok(None),
    };

    let candidates: Vec<&VariantStream> =
        master.variants.iter().filter(|v| !v.is_i_frame).collect();
    if candidates.is_empty() {
        return Err(Error::Playlist {
            reason: "master playlist has no variants".to_string(),
        });
    }

    let selected = match policy {
        VariantSelectionPolicy::HighestBandwidth => {
            candidates.iter().max_by_key(|v| v.bandwidth).copied()
        }
        VariantSelectionPolicy::LowestBandwidth => {
            candidates.iter().min_by_key(|v| v.bandwidth).copied()
        }
        VariantSelectionPolicy::MatchingResolution { width, height } => candidates
            .iter()
            .find(|v| {
                v.resolution
                    .is_some_and(|r| r.width == *width && r.height == *height)
            })
            .copied(),
    }
    .ok_or_else(|| Error::Playlist {
        reason: format!("no variant matches policy {policy:?}"),
    })?;

    let base = BaseUrl::parse(base_url)?;
    let url = base.resolve(&selected.uri);
    debug!(bandwidth = selected.bandwidth, url = %url, "Selected variant playlist");
    Ok(Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
/hd/index.m3u8?token=1
#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720
mid/index.m3u8
";

    const BASE: &str = "https://ex.com/show/master.m3u8";

    #[test]
    fn picks_highest_bandwidth_by_default() {
        let url = select_variant(MASTER, BASE, &VariantSelectionPolicy::default()).unwrap();
        assert_eq!(url.as_deref(), Some("https://ex.com/hd/index.m3u8?token=1"));
    }

    #[test]
    fn picks_lowest_bandwidth() {
        let url = select_variant(MASTER, BASE, &VariantSelectionPolicy::LowestBandwidth).unwrap();
        assert_eq!(url.as_deref(), Some("https://ex.com/show/low/index.m3u8"));
    }

    #[test]
    fn matches_resolution_or_errors() {
        let policy = VariantSelectionPolicy::MatchingResolution {
            width: 1280,
            height: 720,
        };
        let url = select_variant(MASTER, BASE, &policy).unwrap();
        assert_eq!(url.as_deref(), Some("https://ex.com/show/mid/index.m3u8"));

        let missing = VariantSelectionPolicy::MatchingResolution {
            width: 1,
            height: 1,
        };
        assert!(select_variant(MASTER, BASE, &missing).is_err());
    }

    #[test]
    fn media_playlist_yields_none() {
        let media = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\nseg1.ts\n#EXT-X-ENDLIST\n";
        let url = select_variant(media, BASE, &VariantSelectionPolicy::default()).unwrap();
        assert_eq!(url, None);
    }
}
