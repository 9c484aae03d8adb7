pub mod directory_manager;
pub mod file;
pub mod utils;
#[cfg(target_family = "windows")]
pub mod win_permissions;

/// Thin handle over the local filesystem. All the `File*` traits below are
/// implemented on this unit struct so call sites depend on the traits, not
/// on `std::fs` directly, and can swap in [`mock::MockLocalFile`] in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFile;

#[cfg(feature = "mocks")]
pub mod mock {
    use std::io;
    use std::path::Path;
    use std::path::PathBuf;

    use super::file::deleter::FileDeleter;
    use super::file::reader::FileReader;
    use super::file::renamer::FileRenamer;
    use super::file::writer::{FileWriter, WriteError};
    use mockall::mock;

    mock! {
        pub LocalFile {}

        impl FileReader for LocalFile {
            fn read(&self, file_path: &Path) -> io::Result<String>;
            fn dir_entries(&self, dir_path: &Path) -> io::Result<Vec<PathBuf>>;
        }

        impl FileRenamer for LocalFile {
            fn rename(&self, file_path: &Path, rename_path: &Path) -> io::Result<()>;
        }

        impl FileWriter for LocalFile {
            fn write(&self, path: &Path, buf: String) -> Result<(), WriteError>;
        }

        impl FileDeleter for LocalFile {
            fn delete(&self, file_path: &Path) -> io::Result<()>;
        }
    }
}
