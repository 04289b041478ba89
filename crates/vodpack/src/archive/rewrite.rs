// Manifest rewriting: points every segment reference at its local filename.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::Result;
use crate::manifest::uri::BaseUrl;

static MAP_TAG_URI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bURI="([^"]*)""#).unwrap());

/// Rewrites `content` so that every URI line and every `#EXT-X-MAP` URI
/// attribute carries the local filename from `names` (keyed by resolved URL).
///
/// References missing from `names` are left as written. Other lines pass
/// through untouched. Output lines end with `\n`.
pub fn rewrite_manifest(
    content: &str,
    base_url: &str,
    names: &HashMap<String, String>,
) -> Result<String> {
    let base = BaseUrl::parse(base_url)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut out = String::with_capacity(content.len());

    for line in content.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            match names.get(&base.resolve(trimmed)) {
                Some(name) => out.push_str(name),
                None => out.push_str(line),
            }
        } else if is_map_tag(trimmed) {
            let rewritten = MAP_TAG_URI_REGEX.replace(line, |caps: &Captures| {
                match names.get(&base.resolve(&caps[1])) {
                    Some(name) => format!("URI=\"{name}\""),
                    None => caps[0].to_string(),
                }
            });
            out.push_str(&rewritten);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }

    Ok(out)
}

fn is_map_tag(line: &str) -> bool {
    line.get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("#EXT-X-MAP"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_uri_lines_and_map_attributes() {
        let content = "#EXTM3U\r\n#EXT-X-MAP:URI=\"init.mp4?t=1\",BYTERANGE=\"10@0\"\r\n#EXTINF:6.0,\r\nhttps://cdn.io/x/seg.m4s?sig=2\r\n#EXTINF:6.0,\r\n/y/seg.m4s\r\n#EXT-X-ENDLIST";
        let map = names(&[
            ("https://ex.com/v/init.mp4?t=1", "init.mp4"),
            ("https://cdn.io/x/seg.m4s?sig=2", "x__seg.m4s"),
            ("https://ex.com/y/seg.m4s", "y__seg.m4s"),
        ]);

        let rewritten = rewrite_manifest(content, "https://ex.com/v/index.m3u8", &map).unwrap();
        assert_eq!(
            rewritten,
            "#EXTM3U\n#EXT-X-MAP:URI=\"init.mp4\",BYTERANGE=\"10@0\"\n#EXTINF:6.0,\nx__seg.m4s\n#EXTINF:6.0,\ny__seg.m4s\n#EXT-X-ENDLIST\n"
        );
    }

    #[test]
    fn other_uri_attributes_are_untouched() {
        let content = "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\nseg.ts\n";
        let map = names(&[
            ("https://ex.com/v/key.bin", "nope"),
            ("https://ex.com/v/seg.ts", "seg.ts"),
        ]);
        let rewritten = rewrite_manifest(content, "https://ex.com/v/p.m3u8", &map).unwrap();
        assert_eq!(rewritten, "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\nseg.ts\n");
    }

    #[test]
    fn unknown_references_are_kept() {
        let rewritten =
            rewrite_manifest("other.ts\n", "https://ex.com/v/p.m3u8", &HashMap::new()).unwrap();
        assert_eq!(rewritten, "other.ts\n");
    }
}
