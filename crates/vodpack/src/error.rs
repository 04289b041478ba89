use reqwest::StatusCode;

use crate::store::ManifestId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid base URL `{input}`: {reason}")]
    InvalidBaseUrl { input: String, reason: String },

    #[error("manifest from {source_url} references no segments")]
    EmptyManifest { source_url: String },

    #[error("capture rejected: {reason}")]
    Rejected { reason: String },

    #[error("manifest {id} not found")]
    ManifestNotFound { id: ManifestId },

    #[error("a download job is already active for manifest {id}")]
    JobAlreadyActive { id: ManifestId },

    #[error("init segment {url} failed after retry: {reason}")]
    FatalFetch { url: String, reason: String },

    #[error("archive error: {reason}")]
    Archive { reason: String },

    #[error("zip error: {source}")]
    Zip {
        #[from]
        source: zip::result::ZipError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("TLS configuration error: {reason}")]
    Tls { reason: String },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    pub fn invalid_base_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBaseUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn archive(reason: impl Into<String>) -> Self {
        Self::Archive {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure of a single segment fetch. Recorded per unit, never fatal on its own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("fetch cancelled")]
    Cancelled,

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("request for {url} timed out")]
    Timeout { url: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
