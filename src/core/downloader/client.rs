use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use reqwest::Url;
use tracing::debug;

use crate::core::error::{JnlpError, JnlpResult};
use crate::core::http::{build_http_client, APP_USER_AGENT, DEFAULT_TIMEOUT_SECS};

/// An opened remote resource.
pub struct RemoteBody {
    /// Milliseconds since the epoch, 0 if unknown.
    pub last_modified: i64,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub reader: Box<dyn Read + Send>,
}

/// Where cached bytes come from.
pub trait Transport: Send + Sync {
    /// Metadata-only request. Returns 0 when the remote does not say.
    fn last_modified(&self, url: &Url) -> JnlpResult<i64>;

    /// Open a full read of the resource.
    fn open(&self, url: &Url) -> JnlpResult<RemoteBody>;
}

/// Serves `file:` URLs from the filesystem and `http(s):` through a blocking
/// reqwest client.
pub struct DefaultTransport {
    user_agent: String,
    timeout: Duration,
    // Built on first use: a blocking client must not be created on an async runtime thread.
    client: OnceLock<Client>,
}

impl DefaultTransport {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> JnlpResult<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let client = build_http_client(&self.user_agent, self.timeout)?;
        Ok(self.client.get_or_init(|| client))
    }

    fn check_status(url: &Url, status: reqwest::StatusCode) -> JnlpResult<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(JnlpError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new(APP_USER_AGENT, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl Transport for DefaultTransport {
    fn last_modified(&self, url: &Url) -> JnlpResult<i64> {
        match url.scheme() {
            "file" => Ok(file_last_modified(&file_path(url)?)),
            "http" | "https" => {
                let response = self.client()?.head(url.clone()).send()?;
                Self::check_status(url, response.status())?;

                Ok(header_last_modified(response.headers()))
            }
            scheme => Err(unsupported(scheme, url)),
        }
    }

    fn open(&self, url: &Url) -> JnlpResult<RemoteBody> {
        match url.scheme() {
            "file" => {
                let path = file_path(url)?;
                let file = File::open(&path).map_err(|e| JnlpError::io(&path, e))?;
                let content_length = file.metadata().map(|m| m.len()).ok();

                Ok(RemoteBody {
                    last_modified: file_last_modified(&path),
                    content_length,
                    content_type: None,
                    reader: Box::new(file),
                })
            }
            "http" | "https" => {
                let response = self.client()?.get(url.clone()).send()?;
                Self::check_status(url, response.status())?;

                let last_modified = header_last_modified(response.headers());
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let content_length = response.content_length();

                debug!("GET {} ({:?} bytes)", url, content_length);
                Ok(RemoteBody {
                    last_modified,
                    content_length,
                    content_type,
                    reader: Box::new(response),
                })
            }
            scheme => Err(unsupported(scheme, url)),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────

pub fn file_path(url: &Url) -> JnlpResult<PathBuf> {
    url.to_file_path().map_err(|_| JnlpError::InvalidUrl {
        value: url.to_string(),
        reason: "not a local file path".into(),
    })
}

/// Modification time in epoch milliseconds, 0 if the file is missing.
pub fn file_last_modified(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(to_millis)
        .unwrap_or(0)
}

pub fn to_millis(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp_millis()
}

pub fn from_millis(millis: i64) -> Option<SystemTime> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(SystemTime::from)
}

/// Parse an HTTP `Last-Modified` header; anything unparsable is 0.
fn header_last_modified(headers: &reqwest::header::HeaderMap) -> i64 {
    headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

fn unsupported(scheme: &str, url: &Url) -> JnlpError {
    JnlpError::UnsupportedScheme {
        scheme: scheme.to_string(),
        url: url.to_string(),
    }
}
