//! HTTP retrieval of feed archives.
//!
//! [`HttpClient`] is the seam that lets callers stack authentication
//! wrappers ([`auth::ApiKey`], [`auth::UrlParam`]) over [`BasicClient`].

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;
use tracing::debug;

use crate::error::FeedError;

/// Downloads `url` through `client`, treating any non-success status as a
/// retrieval failure.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let retrieval = |reason: String| FeedError::Retrieval {
        source_name: url.to_string(),
        reason,
    };

    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| retrieval(format!("invalid URL: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| retrieval(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(retrieval(format!("server returned status {status}")));
    }

    let bytes = resp.bytes().await.map_err(|e| retrieval(e.to_string()))?;
    debug!(url, bytes = bytes.len(), "Feed archive downloaded");
    Ok(bytes)
}
