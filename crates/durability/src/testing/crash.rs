//! Crash injection backend
//!
//! Wraps [`LocalFs`] and fails at one step of the write path. Everything
//! done before that step is on disk, nothing after it is; once crashed,
//! every further call fails as if the process had died. Reopening the same
//! directory with a fresh store then shows what recovery sees.

use crate::backend::{LocalFs, StorageBackend};
use crate::config::{BACKUP_EXTENSION, TEMP_EXTENSION};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Step of the write path at which the simulated process dies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// Half of the temp file is written
    TornTempWrite,
    /// Temp file is complete; the first rename of the commit never happens
    BeforeCommit,
    /// Entry file moved to `.bak`; temp file not yet moved in
    AfterBackup,
    /// Temp file committed; `.bak` not yet removed
    BeforeBackupRemoval,
}

/// Fault-injecting [`StorageBackend`]
#[derive(Debug)]
pub struct CrashingBackend {
    inner: LocalFs,
    point: CrashPoint,
    /// Matching steps still allowed through before the crash
    remaining: Mutex<usize>,
    crashed: AtomicBool,
}

impl CrashingBackend {
    /// Crash the first time `point` is reached
    pub fn new(point: CrashPoint) -> Self {
        Self::after(point, 0)
    }

    /// Let `skip` occurrences of `point` pass, crash on the next one
    pub fn after(point: CrashPoint, skip: usize) -> Self {
        CrashingBackend {
            inner: LocalFs,
            point,
            remaining: Mutex::new(skip),
            crashed: AtomicBool::new(false),
        }
    }

    /// Whether the crash has happened
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    fn dead(&self) -> io::Result<()> {
        if self.has_crashed() {
            Err(crash_error())
        } else {
            Ok(())
        }
    }

    /// Returns true if this occurrence of the crash point should crash
    fn trigger(&self, point: CrashPoint) -> bool {
        if point != self.point {
            return false;
        }
        let mut remaining = self.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return false;
        }
        self.crashed.store(true, Ordering::SeqCst);
        true
    }
}

fn crash_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "simulated crash")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

fn backup_of(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(BACKUP_EXTENSION);
    path.with_file_name(name)
}

impl StorageBackend for CrashingBackend {
    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        self.dead()?;
        self.inner.list_files(dir, extension)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.dead()?;
        self.inner.read(path)
    }

    fn write_temp(&self, path: &Path, bytes: &[u8], sync: bool) -> io::Result<()> {
        self.dead()?;
        if self.trigger(CrashPoint::TornTempWrite) {
            self.inner.write_temp(path, &bytes[..bytes.len() / 2], false)?;
            return Err(crash_error());
        }
        self.inner.write_temp(path, bytes, sync)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.dead()?;
        let first_commit_step = has_extension(to, BACKUP_EXTENSION)
            || (has_extension(from, TEMP_EXTENSION) && !self.inner.exists(&backup_of(to)));
        if first_commit_step && self.trigger(CrashPoint::BeforeCommit) {
            return Err(crash_error());
        }
        if has_extension(from, TEMP_EXTENSION)
            && self.inner.exists(&backup_of(to))
            && self.trigger(CrashPoint::AfterBackup)
        {
            return Err(crash_error());
        }
        self.inner.rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.dead()?;
        if has_extension(path, BACKUP_EXTENSION) && self.trigger(CrashPoint::BeforeBackupRemoval) {
            return Err(crash_error());
        }
        self.inner.remove_file(path)
    }

    fn remove_dir_all(&self, dir: &Path) -> io::Result<()> {
        self.dead()?;
        self.inner.remove_dir_all(dir)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        self.dead()?;
        self.inner.create_dir_all(dir)
    }

    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        self.dead()?;
        self.inner.sync_dir(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_torn_write_leaves_half_file() {
        let dir = tempdir().unwrap();
        let backend = CrashingBackend::new(CrashPoint::TornTempWrite);
        let path = dir.path().join("x.ksv.tmp");
        assert!(backend.write_temp(&path, b"abcdef", true).is_err());
        assert!(backend.has_crashed());
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_everything_fails_after_crash() {
        let dir = tempdir().unwrap();
        let backend = CrashingBackend::new(CrashPoint::TornTempWrite);
        let _ = backend.write_temp(&dir.path().join("a.tmp"), b"ab", false);
        assert!(backend.read(&dir.path().join("a.tmp")).is_err());
        assert!(backend.create_dir_all(dir.path()).is_err());
        assert!(backend.list_files(dir.path(), "tmp").is_err());
    }

    #[test]
    fn test_skip_lets_earlier_occurrences_through() {
        let dir = tempdir().unwrap();
        let backend = CrashingBackend::after(CrashPoint::TornTempWrite, 1);
        backend
            .write_temp(&dir.path().join("a.tmp"), b"ab", false)
            .unwrap();
        assert!(!backend.has_crashed());
        assert!(backend
            .write_temp(&dir.path().join("b.tmp"), b"ab", false)
            .is_err());
        assert!(backend.has_crashed());
    }
}
