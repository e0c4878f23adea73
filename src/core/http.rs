use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};

pub const APP_USER_AGENT: &str = "jnlp-cache/0.1.0";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Blocking client used for manifest fetches and resource transfers.
///
/// Compression is disabled so `Content-Length` matches the bytes copied
/// into the cache.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .default_headers(default_headers)
        .build()
}
