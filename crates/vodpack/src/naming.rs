//! Segment filename assignment.
//!
//! Every segment URL gets a filesystem-safe local name. Names that collide are
//! prefixed with their parent folder (`<folder>__<name>`); names that are already
//! unique within the set are kept as they are.

use std::collections::{HashMap, HashSet};

use crate::manifest::uri::path_segments;

/// Characters that are invalid in filenames on at least one common filesystem.
const HOSTILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Assigns a local filename to every URL.
///
/// The mapping is deterministic for a given set of URLs. Repeated URLs map to
/// the same name and do not count as collisions.
pub fn resolve(urls: &[String], default_name: &str) -> HashMap<String, String> {
    let mut seen = HashSet::with_capacity(urls.len());
    let distinct: Vec<&str> = urls
        .iter()
        .map(String::as_str)
        .filter(|url| seen.insert(*url))
        .collect();

    let base_names: Vec<String> = distinct
        .iter()
        .map(|url| base_filename(url, default_name))
        .collect();

    let mut tally: HashMap<&str, usize> = HashMap::with_capacity(base_names.len());
    for name in &base_names {
        *tally.entry(name.as_str()).or_default() += 1;
    }

    distinct
        .iter()
        .zip(&base_names)
        .map(|(url, base)| {
            let name = if tally.get(base.as_str()).copied().unwrap_or(0) > 1 {
                format!("{}__{base}", parent_folder(url))
            } else {
                base.clone()
            };
            (url.to_string(), name)
        })
        .collect()
}

/// Last non-empty path segment, query stripped and sanitized, or `default_name`.
pub fn base_filename(url: &str, default_name: &str) -> String {
    let name = path_segments(url)
        .last()
        .map(|segment| sanitize_filename(segment))
        .unwrap_or_default();
    if name.is_empty() {
        default_name.to_string()
    } else {
        name
    }
}

/// Second-to-last non-empty path segment, sanitized; empty when absent.
fn parent_folder(url: &str) -> String {
    let segments = path_segments(url);
    if segments.len() < 2 {
        return String::new();
    }
    sanitize_filename(segments[segments.len() - 2])
}

/// Filename for the rewritten manifest inside the archive.
pub fn manifest_filename(source_url: &str, default_name: &str) -> String {
    base_filename(source_url, default_name)
}

/// Strips non-ASCII, control and filesystem-hostile characters, collapses
/// whitespace runs into one `_` and trims underscores from both ends.
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_whitespace = false;

    for c in raw.chars() {
        if !c.is_ascii() {
            continue;
        }
        if c.is_ascii_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
            continue;
        }
        if c.is_ascii_control() || HOSTILE_CHARS.contains(&c) {
            continue;
        }
        in_whitespace = false;
        out.push(c);
    }

    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn colliding_names_get_parent_prefix() {
        let input = urls(&[
            "https://a.com/x/seg.ts",
            "https://a.com/y/seg.ts",
            "https://a.com/z/unique.ts",
        ]);
        let map = resolve(&input, "segment");

        assert_eq!(map["https://a.com/x/seg.ts"], "x__seg.ts");
        assert_eq!(map["https://a.com/y/seg.ts"], "y__seg.ts");
        assert_eq!(map["https://a.com/z/unique.ts"], "unique.ts");
    }

    #[test]
    fn query_is_stripped_before_naming() {
        let input = urls(&["https://a.com/v/seg-001.ts?token=abc&exp=1"]);
        let map = resolve(&input, "segment");
        assert_eq!(map[&input[0]], "seg-001.ts");
    }

    #[test]
    fn same_file_with_rotating_query_collides() {
        let input = urls(&[
            "https://a.com/p1/seg.ts?sig=1",
            "https://a.com/p2/seg.ts?sig=2",
        ]);
        let map = resolve(&input, "segment");
        assert_eq!(map[&input[0]], "p1__seg.ts");
        assert_eq!(map[&input[1]], "p2__seg.ts");
    }

    #[test]
    fn resolution_is_deterministic() {
        let input = urls(&[
            "https://a.com/1/a.ts",
            "https://a.com/2/a.ts",
            "https://a.com/b.ts",
            "https://a.com/3/c d.ts",
        ]);
        let first = resolve(&input, "segment");
        for _ in 0..10 {
            assert_eq!(resolve(&input, "segment"), first);
        }
    }

    #[test]
    fn distinct_urls_sharing_a_name_get_distinct_outputs() {
        let input = urls(&[
            "https://a.com/720/chunk.ts",
            "https://a.com/1080/chunk.ts",
            "https://b.com/480/chunk.ts",
        ]);
        let map = resolve(&input, "segment");
        let names: HashSet<&String> = map.values().collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn repeated_url_is_not_a_collision() {
        let input = urls(&["https://a.com/x/seg.ts", "https://a.com/x/seg.ts"]);
        let map = resolve(&input, "segment");
        assert_eq!(map.len(), 1);
        assert_eq!(map["https://a.com/x/seg.ts"], "seg.ts");
    }

    #[test]
    fn residual_collision_without_parent_is_left_as_is() {
        let input = urls(&["https://a.com/seg.ts", "https://b.com/seg.ts"]);
        let map = resolve(&input, "segment");
        assert_eq!(map["https://a.com/seg.ts"], "__seg.ts");
        assert_eq!(map["https://b.com/seg.ts"], "__seg.ts");
    }

    #[test]
    fn empty_names_fall_back_to_default() {
        assert_eq!(base_filename("https://a.com/", "segment"), "segment");
        assert_eq!(base_filename("https://a.com/v/%E2%9C%93", "segment"), "%E2%9C%93");
        assert_eq!(base_filename("https://a.com/v/***", "segment"), "segment");
    }

    #[test]
    fn sanitizer_rules() {
        assert_eq!(sanitize_filename("  my   clip:part*1?.ts "), "my_clippart1.ts");
        assert_eq!(sanitize_filename("épisode\t 2.ts"), "pisode_2.ts");
        assert_eq!(sanitize_filename("__a<b>__"), "ab");
        assert_eq!(sanitize_filename("日本"), "");
    }

    #[test]
    fn dropped_characters_do_not_split_whitespace_runs() {
        assert_eq!(sanitize_filename("a : b"), "a_b");
        assert_eq!(sanitize_filename("ep 1 | part 2.ts"), "ep_1_part_2.ts");
        assert_eq!(sanitize_filename("x \u{7f} y"), "x_y");
    }

    #[test]
    fn manifest_name_drops_query() {
        assert_eq!(
            manifest_filename("https://ex.com/v/index.m3u8?sig=1", "playlist.m3u8"),
            "index.m3u8"
        );
        assert_eq!(
            manifest_filename("https://ex.com/", "playlist.m3u8"),
            "playlist.m3u8"
        );
    }
}
