//! Single-instance guard for remediation runs
//!
//! An exclusive, non-blocking `flock` on a token file. The holder writes its
//! PID into the file; the lock is released when the guard is dropped, which
//! also covers early returns and unwinding.

use crate::error::{Error, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Held remediation lock
pub struct RemediationLock {
    path: PathBuf,
    _file: Flock<File>,
}

impl RemediationLock {
    /// Take the lock, failing with `RemediationInProgress` if another run holds it
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::Lock {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }

        // Never truncate before holding the lock: the content belongs to the holder
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::Lock {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let locked = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(locked) => locked,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                return Err(Error::RemediationInProgress(path.to_path_buf()));
            }
            Err((_, errno)) => {
                return Err(Error::Lock {
                    path: path.to_path_buf(),
                    message: errno.to_string(),
                });
            }
        };

        let mut token: &File = &locked;
        token.set_len(0)?;
        writeln!(token, "{}", std::process::id())?;

        Ok(Self {
            path: path.to_path_buf(),
            _file: locked,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded by the current or last holder
    pub fn holder(path: &Path) -> Option<u32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }
}

impl std::fmt::Debug for RemediationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemediationLock")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
