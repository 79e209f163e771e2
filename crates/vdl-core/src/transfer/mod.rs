//! Transfer unit: one HTTP(S) fetch through a libcurl easy handle.
//!
//! A fetch writes to `<dest>.incomplete` and renames over `dest` only after
//! the status code and byte count check out. Cancellation is observed from
//! inside curl (progress callback abort), so an in-flight request stops
//! promptly instead of running to completion.

mod fetch;
mod meter;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::retry::TransferError;

pub use fetch::{fetch_text_blocking, fetch_to_path_blocking};
pub use meter::TransferMeter;

/// Byte range within a resource (`EXT-X-BYTERANGE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub offset: u64,
    pub length: u64,
}

impl ByteSpan {
    /// First byte past the span, or None if it does not fit in a u64.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Curl range string, inclusive end.
    pub fn to_range_header(&self) -> String {
        format!(
            "{}-{}",
            self.offset,
            self.offset.saturating_add(self.length.saturating_sub(1))
        )
    }
}

/// Timeouts applied to a curl handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    /// Hard wall-clock limit for one attempt.
    pub timeout: Option<Duration>,
    /// Abort when throughput stays below 1 KiB/s for this long.
    pub stall_timeout: Option<Duration>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Some(Duration::from_secs(30)),
            stall_timeout: None,
        }
    }
}

/// One resource to fetch.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub byte_range: Option<ByteSpan>,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            url: url.into(),
            headers,
            byte_range: None,
        }
    }
}

/// Body and final URL of a small text resource (manifest).
#[derive(Debug, Clone)]
pub struct FetchedText {
    pub body: Vec<u8>,
    /// URL after redirects; relative playlist URIs resolve against this.
    pub effective_url: String,
}

/// Fetch `request` into `dest` on the blocking pool. Returns bytes written.
pub async fn fetch_to_path(
    request: TransferRequest,
    dest: PathBuf,
    options: TransferOptions,
    meter: Arc<TransferMeter>,
    cancel: CancellationToken,
) -> Result<u64, TransferError> {
    tokio::task::spawn_blocking(move || {
        fetch_to_path_blocking(&request, &dest, &options, &meter, &cancel)
    })
    .await
    .map_err(|e| TransferError::Join(e.to_string()))?
}

/// Fetch a manifest or other small body into memory on the blocking pool.
pub async fn fetch_text(
    request: TransferRequest,
    options: TransferOptions,
    cancel: CancellationToken,
) -> Result<FetchedText, TransferError> {
    tokio::task::spawn_blocking(move || fetch_text_blocking(&request, &options, &cancel))
        .await
        .map_err(|e| TransferError::Join(e.to_string()))?
}
