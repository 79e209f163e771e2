//! Checksum command: compute SHA-256 of a file.

use anyhow::Result;
use std::path::Path;
use vdl_core::checksum;

/// Compute and print size and SHA-256 of the given file.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::digest_path_async(path.to_path_buf()).await?;
    println!("{}  {}  ({} bytes)", digest.sha256, path.display(), digest.size);
    Ok(())
}
