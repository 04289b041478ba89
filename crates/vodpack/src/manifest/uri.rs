use url::Url;

use crate::Error;

/// A parsed playlist location, split into the two prefixes relative
/// references resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    scheme: String,
    origin: String,
    directory: String,
}

impl BaseUrl {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let url = Url::parse(input.trim())
            .map_err(|e| Error::invalid_base_url(input, e.to_string()))?;

        if url.host_str().is_none() {
            return Err(Error::invalid_base_url(input, "URL has no host"));
        }

        let origin = url.origin().ascii_serialization();
        let path = url.path();
        let dir_end = path.rfind('/').map(|i| i + 1).unwrap_or(0);
        let directory = format!("{origin}{}", &path[..dir_end]);

        Ok(Self {
            scheme: url.scheme().to_string(),
            origin,
            directory,
        })
    }

    /// Origin without a trailing slash, e.g. `https://ex.com`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Origin plus path minus its final segment, always ending in `/`.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Resolves a playlist reference.
    ///
    /// Absolute `http(s)` URIs are returned unchanged, `//host/...` inherits
    /// the scheme, a leading `/` is joined to the origin and anything else to
    /// the directory. Query strings are preserved.
    pub fn resolve(&self, reference: &str) -> String {
        let reference = reference.trim();
        if is_absolute_http(reference) {
            reference.to_string()
        } else if reference.starts_with("//") {
            format!("{}:{reference}", self.scheme)
        } else if reference.starts_with('/') {
            format!("{}{reference}", self.origin)
        } else {
            format!("{}{reference}", self.directory)
        }
    }
}

fn is_absolute_http(reference: &str) -> bool {
    let lower = reference
        .get(..8)
        .map(|prefix| prefix.to_ascii_lowercase())
        .unwrap_or_else(|| reference.to_ascii_lowercase());
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Strips the query string and fragment from a URL.
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Non-empty path segments of a URL, query and fragment removed.
pub(crate) fn path_segments(url: &str) -> Vec<&str> {
    let without_query = strip_query(url);
    let path = match without_query.find("://") {
        Some(scheme_end) => {
            let rest = &without_query[scheme_end + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("")
        }
        None => without_query,
    };
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_against_directory() {
        let base = BaseUrl::parse("https://ex.com/v/p.m3u8").unwrap();
        assert_eq!(base.resolve("seg1.ts"), "https://ex.com/v/seg1.ts");
        assert_eq!(base.resolve("a/b.ts?x=1"), "https://ex.com/v/a/b.ts?x=1");
    }

    #[test]
    fn resolves_root_relative_against_origin() {
        let base = BaseUrl::parse("https://ex.com:8443/v/p.m3u8?token=1").unwrap();
        assert_eq!(base.origin(), "https://ex.com:8443");
        assert_eq!(base.resolve("/other/seg.ts"), "https://ex.com:8443/other/seg.ts");
    }

    #[test]
    fn absolute_urls_pass_through() {
        let base = BaseUrl::parse("https://ex.com/v/p.m3u8").unwrap();
        assert_eq!(
            base.resolve("HTTP://cdn.net/s.ts?sig=abc"),
            "HTTP://cdn.net/s.ts?sig=abc"
        );
        assert_eq!(base.resolve("//cdn.net/s.ts"), "https://cdn.net/s.ts");
    }

    #[test]
    fn query_on_base_does_not_leak_into_directory() {
        let base = BaseUrl::parse("https://ex.com/v/p.m3u8?a=b/c").unwrap();
        assert_eq!(base.directory(), "https://ex.com/v/");
    }

    #[test]
    fn malformed_base_is_rejected() {
        assert!(matches!(
            BaseUrl::parse("not a url"),
            Err(Error::InvalidBaseUrl { .. })
        ));
        assert!(BaseUrl::parse("data:text/plain,hello").is_err());
    }

    #[test]
    fn path_segments_skip_empty_parts() {
        assert_eq!(
            path_segments("https://a.com//x/y/seg.ts?q=1"),
            vec!["x", "y", "seg.ts"]
        );
        assert!(path_segments("https://a.com").is_empty());
    }
}
