//! Small helpers shared across modules.
use fs::file::renamer::FileRenamer;
use fs::file::writer::{FileWriter, WriteError};
use fs::LocalFile;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomicWriteError {
    #[error("writing temp file: {0}")]
    Write(#[from] WriteError),
    #[error("renaming into place: {0}")]
    Rename(#[source] std::io::Error),
}

/// Writes `content` to `path` via a sibling `.tmp` file followed by a
/// rename, so readers never observe a partially written file. The temp
/// file inherits `LocalFile::write`'s 0600 mode, so the final file does
/// too since `rename` preserves it.
pub fn atomic_write(path: &Path, content: String) -> Result<(), AtomicWriteError> {
    let tmp_path = path.with_extension("tmp");
    let local = LocalFile;
    local.write(&tmp_path, content)?;
    local.rename(&tmp_path, path).map_err(AtomicWriteError::Rename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_produces_final_file_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        atomic_write(&path, "{}".to_string()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("tmp").exists());
    }
}
