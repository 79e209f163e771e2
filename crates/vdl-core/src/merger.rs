//! Merge ordered segment files into one artifact.
//!
//! Sizes are summed up front, the `.part` output is preallocated, and every
//! segment is copied to its prefix-sum offset. The output only appears under
//! its final name after a sync and an atomic rename, so re-running a merge on
//! the same inputs produces a byte-identical file.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::{self, StorageWriterBuilder};

const COPY_BUF_SIZE: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("segment {index} missing or empty: {}", path.display())]
    Incomplete { index: usize, path: PathBuf },
    #[error("merge I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> MergeError + '_ {
    move |source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub bytes: u64,
    pub segments: usize,
}

/// Concatenate `segments` (in slice order) into `dest`.
pub fn merge_segments(segments: &[PathBuf], dest: &Path) -> Result<MergeSummary, MergeError> {
    let mut sizes = Vec::with_capacity(segments.len());
    for (index, path) in segments.iter().enumerate() {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => sizes.push(meta.len()),
            _ => {
                return Err(MergeError::Incomplete {
                    index,
                    path: path.clone(),
                })
            }
        }
    }
    let total: u64 = sizes.iter().sum();

    let temp = storage::temp_path(dest);
    let mut builder = StorageWriterBuilder::create(&temp).map_err(io_err(&temp))?;
    builder.preallocate(total).map_err(io_err(&temp))?;
    let writer = builder.build();

    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut offset = 0u64;
    for (path, size) in segments.iter().zip(&sizes) {
        if let Err(e) = copy_at(path, &writer, offset, &mut buf) {
            writer.discard();
            return Err(e);
        }
        offset += size;
    }

    if let Err(e) = writer.sync() {
        writer.discard();
        return Err(io_err(&temp)(e));
    }
    writer.finalize(dest).map_err(|e| {
        let _ = storage::remove_if_exists(&temp);
        io_err(dest)(e)
    })?;

    Ok(MergeSummary {
        output: dest.to_path_buf(),
        bytes: total,
        segments: segments.len(),
    })
}

fn copy_at(
    src: &Path,
    writer: &storage::StorageWriter,
    start: u64,
    buf: &mut [u8],
) -> Result<(), MergeError> {
    let mut f = File::open(src).map_err(io_err(src))?;
    let mut offset = start;
    loop {
        let n = f.read(buf).map_err(io_err(src))?;
        if n == 0 {
            return Ok(());
        }
        writer
            .write_at(offset, &buf[..n])
            .map_err(io_err(writer.temp_path()))?;
        offset += n as u64;
    }
}

/// Async wrapper running the merge on the blocking pool.
pub async fn merge_segments_async(
    segments: Vec<PathBuf>,
    dest: PathBuf,
) -> Result<MergeSummary, MergeError> {
    let dest_for_err = dest.clone();
    tokio::task::spawn_blocking(move || merge_segments(&segments, &dest))
        .await
        .map_err(|e| MergeError::Io {
            path: dest_for_err,
            source: io::Error::new(io::ErrorKind::Other, e.to_string()),
        })?
}

/// Remove segment temporaries and then the scratch directory (if empty).
/// Returns the failures; callers log them.
pub fn remove_segments(paths: &[PathBuf], scratch_dir: Option<&Path>) -> Vec<(PathBuf, io::Error)> {
    let mut failures = Vec::new();
    for path in paths {
        for candidate in [path.clone(), storage::incomplete_path(path)] {
            if let Err(e) = storage::remove_if_exists(&candidate) {
                failures.push((candidate, e));
            }
        }
    }
    if let Some(dir) = scratch_dir {
        match std::fs::remove_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => failures.push((dir.to_path_buf(), e)),
        }
    }
    failures
}
