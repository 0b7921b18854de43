//! core::ops::lock
//!
//! Per-repository mutual exclusion for sync workflows.
//!
//! # Architecture
//!
//! Overlapping scheduled runs (a 1-minute pull job and a 15-minute push job,
//! or two runs of the same job) must never operate on one working tree at
//! the same time. Each workflow takes this lock for the duration of its work
//! on a single repository and skips the repository when it is already held.
//!
//! # Storage
//!
//! - `<git_dir>/autosync.lock` - marker file carrying an OS-level exclusive lock
//!
//! # Invariants
//!
//! - Acquisition is non-blocking (fails fast if locked)
//! - At most one holder across all processes
//! - Released on drop (RAII), and by the OS when the holder process dies,
//!   so a killed run never leaves a lock that blocks later runs
//! - The marker is removed on release
//!
//! # Example
//!
//! ```ignore
//! use autosync::core::ops::lock::RepoLock;
//!
//! match RepoLock::try_acquire(git_dir)? {
//!     Some(lock) => {
//!         // ... operate on the working tree ...
//!         drop(lock);
//!     }
//!     None => println!("another run holds this repository, skipping"),
//! }
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::SyncPaths;

/// Attempts made when the marker is unlinked under us between open and lock.
const STALE_MARKER_RETRIES: usize = 3;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another autosync process")]
    AlreadyLocked,

    /// Failed to create the lock marker.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on one repository.
///
/// The lock is released when this guard is dropped, including during
/// panic unwinding.
#[derive(Debug)]
pub struct RepoLock {
    /// Path to the lock marker.
    path: PathBuf,
    /// The open marker with the OS lock held. `Some` while held.
    file: Option<File>,
}

impl RepoLock {
    /// Acquire the lock for the repository whose git directory is
    /// `metadata_dir`.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another holder has it
    /// - [`LockError::CreateFailed`] if the marker cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock call fails
    pub fn acquire(metadata_dir: &Path) -> Result<Self, LockError> {
        if !metadata_dir.is_dir() {
            return Err(LockError::CreateFailed(format!(
                "{} is not a directory",
                metadata_dir.display()
            )));
        }

        let path = SyncPaths::lock_marker(metadata_dir);

        for _ in 0..STALE_MARKER_RETRIES {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| {
                    LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
                })?;

            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(LockError::AlreadyLocked)
                }
                Err(e) => return Err(LockError::AcquireFailed(e.to_string())),
            }

            // The previous holder may have unlinked the marker after we
            // opened it; a lock on an orphaned inode excludes nobody.
            if is_same_file(&file, &path) {
                return Ok(Self {
                    path,
                    file: Some(file),
                });
            }
            let _ = FileExt::unlock(&file);
        }

        Err(LockError::AlreadyLocked)
    }

    /// Try to acquire the lock, returning `None` if already held.
    pub fn try_acquire(metadata_dir: &Path) -> Result<Option<Self>, LockError> {
        match Self::acquire(metadata_dir) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether some other holder currently has the lock.
    ///
    /// Never creates or removes the marker. The check holds a shared lock
    /// on an existing marker for an instant; it never blocks.
    pub fn is_locked(metadata_dir: &Path) -> Result<bool, LockError> {
        let path = SyncPaths::lock_marker(metadata_dir);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(LockError::AcquireFailed(format!(
                    "cannot open {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(false)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(true),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Check if the lock is currently held by this guard.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock marker.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// Idempotent: releasing a guard that no longer holds the lock is a
    /// no-op. The marker is unlinked before the OS lock is dropped so a
    /// concurrent acquirer can detect the stale inode.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            let removed = remove_marker(&self.path);
            FileExt::unlock(&file)
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
            drop(file);
            #[cfg(not(unix))]
            let removed = removed.or_else(|_| remove_marker(&self.path));
            removed?;
        }
        Ok(())
    }
}

fn remove_marker(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::ReleaseFailed(e.to_string())),
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        // Best-effort release on drop
        let _ = self.release();
    }
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(on_disk)) => held.dev() == on_disk.dev() && held.ino() == on_disk.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(_file: &File, path: &Path) -> bool {
    // Open files cannot be unlinked on Windows, so the marker is ours if it exists.
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    fn metadata_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    #[test]
    fn lock_acquire_succeeds() {
        let temp = metadata_dir();

        let lock = RepoLock::acquire(temp.path()).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
    }

    #[test]
    fn lock_prevents_second_acquire() {
        let temp = metadata_dir();

        let lock1 = RepoLock::acquire(temp.path()).expect("first acquire");
        assert!(lock1.is_held());

        let result = RepoLock::acquire(temp.path());
        assert!(matches!(result, Err(LockError::AlreadyLocked)));
    }

    #[test]
    fn lock_released_on_drop_and_marker_removed() {
        let temp = metadata_dir();
        let marker = SyncPaths::lock_marker(temp.path());

        {
            let lock = RepoLock::acquire(temp.path()).expect("first acquire");
            assert!(lock.is_held());
            assert!(marker.exists());
        }

        assert!(!marker.exists());
        let lock2 = RepoLock::acquire(temp.path()).expect("second acquire");
        assert!(lock2.is_held());
    }

    #[test]
    fn multiple_release_calls_are_safe() {
        let temp = metadata_dir();

        let mut lock = RepoLock::acquire(temp.path()).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release should be ok");
        assert!(!lock.is_held());
    }

    #[test]
    fn try_acquire_returns_none_when_locked() {
        let temp = metadata_dir();
        let _lock1 = RepoLock::acquire(temp.path()).expect("first acquire");

        let result = RepoLock::try_acquire(temp.path()).expect("try_acquire");
        assert!(result.is_none());
    }

    #[test]
    fn leftover_marker_does_not_block() {
        // A holder killed mid-run leaves the file but not the OS lock.
        let temp = metadata_dir();
        std::fs::write(SyncPaths::lock_marker(temp.path()), b"").unwrap();

        let lock = RepoLock::try_acquire(temp.path()).expect("try_acquire");
        assert!(lock.is_some());
    }

    #[test]
    fn is_locked_reflects_holder() {
        let temp = metadata_dir();
        assert!(!RepoLock::is_locked(temp.path()).unwrap());

        let lock = RepoLock::acquire(temp.path()).expect("acquire");
        assert!(RepoLock::is_locked(temp.path()).unwrap());

        drop(lock);
        assert!(!RepoLock::is_locked(temp.path()).unwrap());
    }

    #[test]
    fn is_locked_leaves_marker_in_place() {
        let temp = metadata_dir();
        let marker = SyncPaths::lock_marker(temp.path());
        std::fs::write(&marker, b"").unwrap();

        assert!(!RepoLock::is_locked(temp.path()).unwrap());
        assert!(marker.exists());

        // The surviving marker is reused by the next holder.
        let lock = RepoLock::try_acquire(temp.path()).expect("try_acquire");
        assert!(lock.is_some());
        assert!(RepoLock::is_locked(temp.path()).unwrap());
    }

    #[test]
    fn is_locked_never_creates_marker() {
        let temp = metadata_dir();

        assert!(!RepoLock::is_locked(temp.path()).unwrap());
        assert!(!SyncPaths::lock_marker(temp.path()).exists());
    }

    #[test]
    fn missing_metadata_dir_is_an_error() {
        let temp = metadata_dir();
        let result = RepoLock::acquire(&temp.path().join("nope"));
        assert!(matches!(result, Err(LockError::CreateFailed(_))));
    }

    #[test]
    fn concurrent_acquirers_have_single_winner() {
        let temp = metadata_dir();
        let dir = temp.path().to_path_buf();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dir = dir.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    RepoLock::try_acquire(&dir).expect("try_acquire")
                })
            })
            .collect();

        // Guards are returned, not dropped, so every winner is still holding.
        let guards: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();
        assert_eq!(guards.iter().filter(|g| g.is_some()).count(), 1);

        drop(guards);
        assert!(!SyncPaths::lock_marker(&dir).exists());
    }

    #[test]
    fn error_display_formatting() {
        assert!(LockError::AlreadyLocked.to_string().contains("locked"));
        assert!(LockError::CreateFailed("x".into()).to_string().contains("create"));
        assert!(LockError::AcquireFailed("x".into()).to_string().contains("acquire"));
        assert!(LockError::ReleaseFailed("x".into()).to_string().contains("release"));
    }
}
