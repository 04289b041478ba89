//! # Builder for VodpackConfig
//!
//! Fluent construction of [`VodpackConfig`] values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vodpack_engine::VodpackConfig;
//!
//! let config = VodpackConfig::builder()
//!     .with_batch_size(8)
//!     .with_retry_batch_size(2)
//!     .with_request_timeout(Some(Duration::from_secs(20)))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("Referer", "https://example.com/")
//!     .with_max_manifests(20)
//!     .build();
//!
//! assert_eq!(config.download.batch_size, 8);
//! assert_eq!(config.store.max_manifests, 20);
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{CapturePolicy, VodpackConfig};

/// Builder for creating VodpackConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct VodpackConfigBuilder {
    config: VodpackConfig,
}

impl VodpackConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: VodpackConfig::default(),
        }
    }

    /// Set the overall timeout for HTTP requests made by the default client
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.http.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header, ignored if name or value is invalid
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.http.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.http.headers = headers;
        self
    }

    /// Set the first-pass batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.download.batch_size = batch_size;
        self
    }

    /// Set the retry-pass batch size
    pub fn with_retry_batch_size(mut self, batch_size: usize) -> Self {
        self.config.download.retry_batch_size = batch_size;
        self
    }

    /// Set the pause before the retry pass
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.config.download.retry_delay = delay;
        self
    }

    /// Set or clear the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.download.request_timeout = timeout;
        self
    }

    /// Set the bound of the manifest store
    pub fn with_max_manifests(mut self, max: usize) -> Self {
        self.config.store.max_manifests = max;
        self
    }

    /// Set the deflate level used for archive entries
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.config.archive.compression_level = level;
        self
    }

    /// Set the transport encoding chunk size
    pub fn with_encode_chunk_size(mut self, size: usize) -> Self {
        self.config.archive.encode_chunk_size = size;
        self
    }

    /// Set the extension of the file produced by the build script
    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.archive.output_extension = extension.into();
        self
    }

    /// Replace the capture acceptance policy
    pub fn with_capture_policy(mut self, policy: CapturePolicy) -> Self {
        self.config.capture = policy;
        self
    }

    /// Set how long finished jobs remain visible to status polls
    pub fn with_finished_job_linger(mut self, linger: Duration) -> Self {
        self.config.jobs.finished_job_linger = linger;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> VodpackConfig {
        self.config
    }
}

impl Default for VodpackConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = VodpackConfigBuilder::new()
            .with_batch_size(10)
            .with_retry_batch_size(3)
            .with_request_timeout(Some(Duration::from_secs(5)))
            .with_capture_policy(CapturePolicy {
                require_vod: false,
                min_segments: 2,
            })
            .build();

        assert_eq!(config.download.batch_size, 10);
        assert_eq!(config.download.retry_batch_size, 3);
        assert_eq!(
            config.download.request_timeout,
            Some(Duration::from_secs(5))
        );
        assert!(!config.capture.require_vod);
        assert_eq!(config.capture.min_segments, 2);
    }

    #[test]
    fn invalid_header_is_ignored() {
        let config = VodpackConfigBuilder::new()
            .with_header("bad header", "value")
            .with_header("x-token", "abc")
            .build();

        assert!(config.http.headers.get("x-token").is_some());
        assert!(config.http.headers.get("bad header").is_none());
    }
}
