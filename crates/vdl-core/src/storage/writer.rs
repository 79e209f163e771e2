//! Offset writer for temp files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Writer for a temp file. Clones share the handle; each `write_at` is
/// independent (pwrite-style).
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl StorageWriter {
    pub(crate) fn from_file_and_path(file: File, temp_path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            temp_path,
        }
    }

    /// Write `data` at `offset`. Does not change the file cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = (*self.file).try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    /// Sync file data to disk. Call before `finalize`.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically rename the temp file to `final_path`, closing this handle.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        let StorageWriter { file, temp_path } = self;
        drop(file);
        std::fs::rename(&temp_path, final_path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "rename {} to {}: {}",
                    temp_path.display(),
                    final_path.display(),
                    e
                ),
            )
        })
    }

    /// Drop the handle and remove the temp file (failed or cancelled transfer).
    pub fn discard(self) {
        let StorageWriter { file, temp_path } = self;
        drop(file);
        if let Err(e) = super::remove_if_exists(&temp_path) {
            tracing::warn!(path = %temp_path.display(), error = %e, "could not remove temp file");
        }
    }
}
