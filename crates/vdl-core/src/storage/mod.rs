//! Disk I/O and file lifecycle.
//!
//! Every file the engine produces is written under a temporary name and
//! renamed into place only once complete: segment bodies land in
//! `<segment>.incomplete` and become `<segment>` (`.part`) after a verified
//! transfer, merged artifacts are assembled in `<artifact>.part`. A file with
//! its final name is therefore always whole.

mod builder;
mod writer;

use std::path::{Path, PathBuf};

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

/// Temporary suffix for merged artifacts before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";
/// Suffix for a transfer that has not finished yet.
pub const INCOMPLETE_SUFFIX: &str = ".incomplete";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}

/// Path for the artifact temp file: `ep1.ts` → `ep1.ts.part`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, TEMP_SUFFIX)
}

/// Path an in-flight transfer writes to: `7_3.part` → `7_3.part.incomplete`.
pub fn incomplete_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, INCOMPLETE_SUFFIX)
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn suffix_helpers() {
        assert_eq!(temp_path(Path::new("ep1.ts")).to_string_lossy(), "ep1.ts.part");
        assert_eq!(
            incomplete_path(Path::new("/tmp/7_3.part")).to_string_lossy(),
            "/tmp/7_3.part.incomplete"
        );
    }

    #[test]
    fn create_preallocate_write_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("output.ts");
        let tp = temp_path(&final_path);

        let mut builder = StorageWriterBuilder::create(&tp).unwrap();
        builder.preallocate(100).unwrap();
        let writer = builder.build();

        writer.write_at(0, b"hello").unwrap();
        writer.write_at(50, b"world").unwrap();
        writer.write_at(95, b"xy").unwrap();
        writer.sync().unwrap();
        writer.finalize(&final_path).unwrap();

        assert!(!tp.exists());
        let mut f = std::fs::File::open(&final_path).unwrap();
        let mut buf = vec![0u8; 100];
        f.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[0..5], b"hello");
        assert_eq!(&buf[50..55], b"world");
        assert_eq!(&buf[95..97], b"xy");
    }

    #[test]
    fn discard_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("seg.part.incomplete");
        let writer = StorageWriterBuilder::create(&tp).unwrap().build();
        writer.write_at(0, b"abc").unwrap();
        writer.discard();
        assert!(!tp.exists());
        remove_if_exists(&tp).unwrap();
    }
}
