//! Exclusive access to the ledger across processes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::LedgerError;

/// Lock file next to the ledger, removed when dropped.
///
/// The file holds the owner's process id. A lock whose owner is known to be gone is
/// taken over; otherwise [`LedgerLock::clear`] removes it by hand.
#[derive(Debug)]
pub struct LedgerLock {
    path: PathBuf,
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// No portable liveness check; such locks are cleared with `clear`.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl LedgerLock {
    /// Path of the lock guarding `ledger`.
    pub fn path_for(ledger: &Path) -> PathBuf {
        let mut name = ledger.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Process id recorded in the lock guarding `ledger`, if one is held.
    pub fn holder(ledger: &Path) -> Option<u32> {
        fs::read_to_string(Self::path_for(ledger))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Take the lock, failing with [`LedgerError::Busy`] when a live run holds it.
    pub fn acquire(ledger: &Path) -> Result<Self, LedgerError> {
        let path = Self::path_for(ledger);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match Self::create(&path) {
            Err(LedgerError::Busy(_)) => {}
            other => return other,
        }

        match Self::holder(ledger) {
            Some(pid) if !process_alive(pid) => {
                warn!(lock = %path.display(), pid, "Taking over ledger lock of a finished run");
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Self::create(&path)
            }
            _ => Err(LedgerError::Busy(path)),
        }
    }

    fn create(path: &Path) -> Result<Self, LedgerError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                // Owner, for whoever finds a stale lock
                let _ = writeln!(file, "{}", std::process::id());
                debug!(lock = %path.display(), "Acquired ledger lock");
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LedgerError::Busy(path.to_path_buf())),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the lock guarding `ledger` whoever holds it.
    ///
    /// Returns the removed lock's path, or `None` when there was no lock.
    pub fn clear(ledger: &Path) -> Result<Option<PathBuf>, LedgerError> {
        let path = Self::path_for(ledger);
        match fs::remove_file(&path) {
            Ok(()) => {
                warn!(lock = %path.display(), "Removed ledger lock");
                Ok(Some(path))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "Failed to remove ledger lock");
        }
    }
}
