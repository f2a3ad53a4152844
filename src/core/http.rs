use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;

const APP_USER_AGENT: &str = concat!("mods-catalog/", env!("CARGO_PKG_VERSION"));

/// Shared client for release feeds and artifact downloads.
///
/// `timeout` bounds connecting and each individual read, not the whole
/// request: a stalled upstream fails into the per-mod error path, while a
/// large artifact that keeps streaming is allowed to finish.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json, */*"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
}
