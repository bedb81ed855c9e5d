//! Advisory lock serialising first-time artifact builds across processes.
//!
//! The lock lives in `<artifact>.lock` beside the artifact and is released
//! when the [`BuildLock`] is dropped (or its process exits). The lock file
//! itself is left behind; only the OS lock on it matters.

use std::fs::{File, OpenOptions};
use std::io::{Result as IoResult, Write};
use std::path::{Path, PathBuf};

/// Exclusive build lock for one artifact path.
#[derive(Debug)]
pub struct BuildLock {
    _file: File,
    path: PathBuf,
}

impl BuildLock {
    /// The lock file guarding `artifact`.
    #[must_use]
    pub fn lock_path(artifact: &Path) -> PathBuf {
        let mut name = artifact.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".lock");
        artifact.with_file_name(name)
    }

    /// Takes the build lock for `artifact` without waiting.
    ///
    /// Returns `Ok(None)` if another builder holds it. The holder's process
    /// id is written into the lock file for diagnostics.
    ///
    /// # Errors
    /// The lock file cannot be opened, or the platform has no file locking.
    pub fn try_acquire(artifact: &Path) -> IoResult<Option<Self>> {
        let path = Self::lock_path(artifact);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !try_lock_exclusive(&file)? {
            return Ok(None);
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Some(Self { _file: file, path }))
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `Ok(false)` means the lock is held elsewhere.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and open for its lifetime.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY};
    use windows_sys::Win32::System::IO::OVERLAPPED;

    // SAFETY: the handle is owned by `file`; OVERLAPPED is plain data.
    let locked = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            file.as_raw_handle() as HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if locked != 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock_exclusive(_file: &File) -> IoResult<bool> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "file locking not supported on this platform",
    ))
}
