use std::path::PathBuf;
use thiserror::Error;

use crate::core::jnlp::ParseError;

/// Central error type for the descriptor parser and the cache engine.
/// Every module returns `Result<T, JnlpError>`.
#[derive(Debug, Error)]
pub enum JnlpError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Unsupported URL scheme `{scheme}` for {url}")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("Invalid URL `{value}`: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("Bad MIME type for {url}: {content_type}")]
    BadMimeType { url: String, content_type: String },

    // ── Manifest ────────────────────────────────────────
    #[error("Descriptor parse error: {0}")]
    Parse(#[from] ParseError),

    // ── Cache ───────────────────────────────────────────
    #[error("Invalid cache at {path:?}: {reason}")]
    InvalidCache { path: PathBuf, reason: String },

    #[error("Cache has been released")]
    CacheReleased,

    #[error("Unable to define descriptor in cache: {0}")]
    NoInformation(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type JnlpResult<T> = Result<T, JnlpError>;

impl From<std::io::Error> for JnlpError {
    fn from(source: std::io::Error) -> Self {
        JnlpError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl JnlpError {
    /// Wrap an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JnlpError::Io {
            path: path.into(),
            source,
        }
    }
}
