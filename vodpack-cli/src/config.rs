use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use vodpack_engine::{CapturePolicy, VodpackConfig};

use crate::cli::CliArgs;
use crate::error::{AppError, Result};

/// Settings read from the TOML configuration file. Every field is optional and
/// command line flags take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub retry_batch_size: Option<usize>,
    pub retry_delay_ms: Option<u64>,
    /// Per-segment request timeout in seconds
    pub request_timeout: Option<u64>,
    pub connect_timeout: Option<u64>,
    pub user_agent: Option<String>,
    pub headers: HashMap<String, String>,
    pub compression_level: Option<u8>,
    pub output_extension: Option<String>,
    pub allow_live: Option<bool>,
}

impl FileConfig {
    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vodpack").join("config.toml"))
    }
}

/// Builds the engine configuration: defaults, then the file, then flags.
pub fn engine_config(args: &CliArgs, file: &FileConfig) -> Result<VodpackConfig> {
    let mut builder = VodpackConfig::builder();

    if let Some(size) = args.batch_size.or(file.batch_size) {
        builder = builder.with_batch_size(size);
    }
    if let Some(size) = args.retry_batch_size.or(file.retry_batch_size) {
        builder = builder.with_retry_batch_size(size);
    }
    if let Some(ms) = file.retry_delay_ms {
        builder = builder.with_retry_delay(Duration::from_millis(ms));
    }
    if let Some(secs) = args.request_timeout.or(file.request_timeout) {
        builder = builder.with_request_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    if let Some(secs) = file.connect_timeout {
        builder = builder.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(user_agent) = &file.user_agent {
        builder = builder.with_user_agent(user_agent.clone());
    }
    for (name, value) in &file.headers {
        builder = builder.with_header(name, value);
    }
    if let Some(level) = file.compression_level {
        builder = builder.with_compression_level(level);
    }
    if let Some(extension) = &file.output_extension {
        builder = builder.with_output_extension(extension.clone());
    }

    let allow_live = args.allow_live || file.allow_live.unwrap_or(false);
    builder = builder.with_capture_policy(CapturePolicy {
        require_vod: !allow_live,
        ..CapturePolicy::default()
    });

    let config = builder.build();
    config.validate()?;
    Ok(config)
}
