//! SHA-256 digests of finished artifacts.
//!
//! Computed once after a merge or direct download completes, for the
//! record log and for `vdl checksum`.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Size and lowercase-hex SHA-256 of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    pub sha256: String,
}

/// Hash a file in fixed-size chunks.
pub fn digest_path(path: &Path) -> Result<FileDigest> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    let mut size = 0u64;
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        size += n as u64;
        hasher.update(&buf[..n]);
    }
    Ok(FileDigest {
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}

pub fn sha256_path(path: &Path) -> Result<String> {
    Ok(digest_path(path)?.sha256)
}

/// Async wrapper; hashing large artifacts must not stall the runtime.
pub async fn digest_path_async(path: std::path::PathBuf) -> Result<FileDigest> {
    tokio::task::spawn_blocking(move || digest_path(&path))
        .await
        .context("checksum task panicked")?
}
