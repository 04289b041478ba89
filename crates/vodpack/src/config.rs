use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Top-level configuration for a capture session
#[derive(Debug, Clone, Default)]
pub struct VodpackConfig {
    pub http: HttpConfig,
    pub download: DownloadConfig,
    pub store: StoreConfig,
    pub archive: ArchiveConfig,
    pub capture: CapturePolicy,
    pub jobs: JobConfig,
}

impl VodpackConfig {
    pub fn builder() -> crate::builder::VodpackConfigBuilder {
        crate::builder::VodpackConfigBuilder::new()
    }

    /// Checks the invariants the orchestrator and archive builder rely on.
    pub fn validate(&self) -> crate::Result<()> {
        if self.download.batch_size == 0 {
            return Err(crate::Error::configuration("batch_size must be at least 1"));
        }
        if self.download.retry_batch_size == 0 {
            return Err(crate::Error::configuration(
                "retry_batch_size must be at least 1",
            ));
        }
        if self.store.max_manifests == 0 {
            return Err(crate::Error::configuration(
                "max_manifests must be at least 1",
            ));
        }
        if self.archive.encode_chunk_size == 0 || self.archive.encode_chunk_size % 3 != 0 {
            return Err(crate::Error::configuration(
                "encode_chunk_size must be a positive multiple of 3",
            ));
        }
        if self.archive.compression_level > 9 {
            return Err(crate::Error::configuration(
                "compression_level must be between 0 and 9",
            ));
        }
        Ok(())
    }
}

/// HTTP client options used for segment and playlist requests
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for a request, zero disables it
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers sent with every request
    pub headers: HeaderMap,

    /// Maximum idle connections to keep per host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpConfig::default_headers(),
            pool_max_idle_per_host: 10,
        }
    }
}

impl HttpConfig {
    pub fn default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

// --- Download Configuration ---
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Segments fetched concurrently per batch in the first pass
    pub batch_size: usize,
    /// Segments fetched concurrently per batch in the retry pass
    pub retry_batch_size: usize,
    /// Pause before the retry pass starts
    pub retry_delay: Duration,
    /// Per-request timeout. `None` leaves hung requests to cancellation.
    pub request_timeout: Option<Duration>,
    /// Name used when a segment URL yields no usable filename
    pub default_segment_name: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            batch_size: 6,
            retry_batch_size: 2,
            retry_delay: Duration::from_millis(500),
            request_timeout: None,
            default_segment_name: "segment".to_string(),
        }
    }
}

// --- Store Configuration ---
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of manifests retained before FIFO eviction
    pub max_manifests: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_manifests: 50 }
    }
}

// --- Archive Configuration ---
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Deflate level, 0 stores entries uncompressed
    pub compression_level: u8,
    /// Bytes of compressed archive encoded per step, must be a multiple of 3
    pub encode_chunk_size: usize,
    /// Name of the generated build script inside the archive
    pub script_name: String,
    /// Extension of the file the build script produces
    pub output_extension: String,
    /// Manifest filename used when the source URL has no usable name
    pub default_manifest_name: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            encode_chunk_size: 3 * 64 * 1024,
            script_name: "build.sh".to_string(),
            output_extension: "mp4".to_string(),
            default_manifest_name: "playlist.m3u8".to_string(),
        }
    }
}

/// Acceptance rules applied before a parsed manifest is stored
#[derive(Debug, Clone)]
pub struct CapturePolicy {
    /// Reject playlists that are not marked as VOD
    pub require_vod: bool,
    /// Minimum number of media segments
    pub min_segments: usize,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            require_vod: true,
            min_segments: 1,
        }
    }
}

// --- Job Configuration ---
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// How long a finished job stays visible to status polls
    pub finished_job_linger: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            finished_job_linger: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(VodpackConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_encode_chunk_not_multiple_of_three() {
        let mut config = VodpackConfig::default();
        config.archive.encode_chunk_size = 1000;
        assert!(matches!(
            config.validate(),
            Err(crate::Error::Configuration { .. })
        ));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut config = VodpackConfig::default();
        config.download.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
