//! Persistence primitive
//!
//! [`DurableStore`](crate::DurableStore) only needs a handful of file
//! operations. They sit behind [`StorageBackend`] so tests can inject faults
//! and other byte stores can stand in for the local filesystem.
//!
//! No method keeps a handle open past its own call.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File operations used by the durable store
pub trait StorageBackend: Send + Sync {
    /// Files directly inside `dir` whose extension equals `extension`, sorted
    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>>;

    /// Read a whole file
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate `path` and write `bytes`, fsyncing if `sync`
    fn write_temp(&self, path: &Path, bytes: &[u8], sync: bool) -> io::Result<()>;

    /// Atomically rename `from` to `to`, replacing `to` if it exists
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Delete one file
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Delete a directory and everything below it
    fn remove_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Whether a file or directory exists
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and its parents
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Persist directory entries (renames, creations) to disk
    fn sync_dir(&self, dir: &Path) -> io::Result<()>;
}

/// Local filesystem backend
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl StorageBackend for LocalFs {
    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_temp(&self, path: &Path, bytes: &[u8], sync: bool) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(bytes)?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, dir: &Path) -> io::Result<()> {
        match fs::remove_dir_all(dir) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        // Directories cannot be opened for syncing on Windows
        #[cfg(unix)]
        {
            fs::File::open(dir)?.sync_all()?;
        }
        #[cfg(not(unix))]
        {
            let _ = dir;
        }
        Ok(())
    }
}
