//! Blocking curl fetches. Run these on the blocking pool.

use std::cell::{Cell, RefCell};
use std::path::Path;

use curl::easy::{Easy, List};
use tokio_util::sync::CancellationToken;

use super::{FetchedText, TransferMeter, TransferOptions, TransferRequest};
use crate::retry::TransferError;
use crate::storage::{self, StorageWriter, StorageWriterBuilder};

const USER_AGENT: &str = concat!("vdl/", env!("CARGO_PKG_VERSION"));
const STALL_SPEED_LIMIT: u32 = 1024;

fn configure(
    easy: &mut Easy,
    request: &TransferRequest,
    options: &TransferOptions,
) -> Result<(), curl::Error> {
    easy.url(&request.url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(USER_AGENT)?;
    easy.connect_timeout(options.connect_timeout)?;
    if let Some(timeout) = options.timeout {
        easy.timeout(timeout)?;
    }
    if let Some(stall) = options.stall_timeout {
        easy.low_speed_limit(STALL_SPEED_LIMIT)?;
        easy.low_speed_time(stall)?;
    }
    if let Some(span) = request.byte_range {
        easy.range(&span.to_range_header())?;
    }
    if !request.headers.is_empty() {
        let mut list = List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }
    // Enables the progress callback used for cancellation.
    easy.progress(true)?;
    Ok(())
}

/// Status code from an HTTP status line (`HTTP/1.1 206 Partial Content`).
fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

fn parse_content_length(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

fn check_status(easy: &mut Easy) -> Result<(), TransferError> {
    let code = easy.response_code().map_err(TransferError::Curl)?;
    // 0 for non-HTTP schemes (file://).
    if code != 0 && !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }
    Ok(())
}

fn map_perform_error(
    e: curl::Error,
    cancel: &CancellationToken,
    storage_error: Option<std::io::Error>,
) -> TransferError {
    if e.is_aborted_by_callback() && cancel.is_cancelled() {
        return TransferError::Cancelled;
    }
    if e.is_write_error() {
        if let Some(io_err) = storage_error {
            return TransferError::Storage(io_err);
        }
    }
    TransferError::Curl(e)
}

/// Stream the body into `writer`, returning the number of bytes written.
/// Bytes counted into `meter` are given back on failure.
fn perform_into(
    request: &TransferRequest,
    writer: &StorageWriter,
    options: &TransferOptions,
    meter: &TransferMeter,
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let written = Cell::new(0u64);
    let result = perform_counted(request, writer, options, meter, cancel, &written);
    if result.is_err() {
        meter.sub(written.get());
    }
    result
}

fn perform_counted(
    request: &TransferRequest,
    writer: &StorageWriter,
    options: &TransferOptions,
    meter: &TransferMeter,
    cancel: &CancellationToken,
    written: &Cell<u64>,
) -> Result<u64, TransferError> {
    let mut easy = Easy::new();
    configure(&mut easy, request, options).map_err(TransferError::Curl)?;

    let storage_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
    let last_status = Cell::new(0u32);
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                let offset = written.get();
                match writer.write_at(offset, data) {
                    Ok(()) => {
                        written.set(offset + data.len() as u64);
                        meter.add(data.len() as u64);
                        Ok(data.len())
                    }
                    Err(e) => {
                        storage_error.borrow_mut().replace(e);
                        Ok(0)
                    }
                }
            })
            .map_err(TransferError::Curl)?;
        transfer
            .header_function(|header| {
                let line = String::from_utf8_lossy(header);
                if let Some(code) = parse_status_line(&line) {
                    last_status.set(code);
                } else if let Some(len) = parse_content_length(&line) {
                    if (200..300).contains(&last_status.get()) && request.byte_range.is_none() {
                        meter.observe_content_length(len);
                    }
                }
                true
            })
            .map_err(TransferError::Curl)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(TransferError::Curl)?;
        if let Err(e) = transfer.perform() {
            return Err(map_perform_error(e, cancel, storage_error.take()));
        }
    }

    check_status(&mut easy)?;

    let received = written.get();
    if received == 0 {
        return Err(TransferError::EmptyBody);
    }
    let expected = match request.byte_range {
        Some(span) => Some(span.length),
        None => easy
            .content_length_download()
            .ok()
            .filter(|len| *len >= 0.0)
            .map(|len| len as u64),
    };
    if let Some(expected) = expected {
        if expected != received {
            return Err(TransferError::PartialTransfer { expected, received });
        }
    }
    Ok(received)
}

/// Fetch `request` into `dest` through `<dest>.incomplete` and an atomic rename.
///
/// The incomplete file is removed on every failure path, so `dest` either
/// holds a complete body or does not exist (or keeps its previous content).
pub fn fetch_to_path_blocking(
    request: &TransferRequest,
    dest: &Path,
    options: &TransferOptions,
    meter: &TransferMeter,
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    let part = storage::incomplete_path(dest);
    let writer = StorageWriterBuilder::create(&part)
        .map_err(TransferError::Storage)?
        .build();

    let received = match perform_into(request, &writer, options, meter, cancel) {
        Ok(n) => n,
        Err(e) => {
            writer.discard();
            return Err(e);
        }
    };
    if let Err(e) = writer.sync() {
        meter.sub(received);
        writer.discard();
        return Err(TransferError::Storage(e));
    }
    if let Err(e) = writer.finalize(dest) {
        meter.sub(received);
        let _ = storage::remove_if_exists(&part);
        return Err(TransferError::Storage(e));
    }
    tracing::trace!(url = %request.url, dest = %dest.display(), bytes = received, "fetched");
    Ok(received)
}

/// Fetch a small body into memory, reporting the post-redirect URL.
pub fn fetch_text_blocking(
    request: &TransferRequest,
    options: &TransferOptions,
    cancel: &CancellationToken,
) -> Result<FetchedText, TransferError> {
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    let mut easy = Easy::new();
    configure(&mut easy, request, options).map_err(TransferError::Curl)?;

    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(TransferError::Curl)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(TransferError::Curl)?;
        if let Err(e) = transfer.perform() {
            return Err(map_perform_error(e, cancel, None));
        }
    }

    check_status(&mut easy)?;
    let effective_url = easy
        .effective_url()
        .map_err(TransferError::Curl)?
        .map(str::to_owned)
        .unwrap_or_else(|| request.url.clone());
    Ok(FetchedText {
        body,
        effective_url,
    })
}
