//! Transaction marker guarding lock.json against concurrent writers
//!
//! The marker is a file created with exclusive-create semantics, so two
//! processes can never both hold it. It records the holder's pid and start
//! time. The guard removes it on drop, which covers every early return and
//! panic unwinding inside the process. A marker left by a crashed process
//! stays until removed by hand, unless a staleness window is configured.
//!
//! Reclaiming a stale marker renames it aside before deleting it, and only
//! deletes it if the renamed file is still the one that was judged stale.
//! Two processes reclaiming at once therefore cannot remove each other's
//! fresh marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::paths::VoltPaths;
use crate::{Result, VoltError};

/// Content of the marker file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerInfo {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl MarkerInfo {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }

    fn describe(&self) -> String {
        format!("pid {} since {}", self.pid, self.started_at.to_rfc3339())
    }

    fn read(marker: &Path) -> Option<Self> {
        let content = fs::read_to_string(marker).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// What was observed about an existing marker when judging it
#[derive(Debug, Clone, PartialEq)]
struct MarkerSnapshot {
    /// None when the marker is empty or partially written
    info: Option<MarkerInfo>,
    modified: Option<SystemTime>,
}

impl MarkerSnapshot {
    fn read(marker: &Path) -> Option<Self> {
        let metadata = fs::metadata(marker).ok()?;
        Some(Self {
            info: MarkerInfo::read(marker),
            modified: metadata.modified().ok(),
        })
    }

    /// Older than `window` and not held by a live process
    ///
    /// A marker without readable content is aged by its mtime and has no
    /// holder to check.
    fn is_stale(&self, window: Duration) -> bool {
        let age = match (&self.info, self.modified) {
            (Some(info), _) => Utc::now().signed_duration_since(info.started_at).to_std().ok(),
            (None, Some(modified)) => SystemTime::now().duration_since(modified).ok(),
            (None, None) => None,
        };
        let old_enough = age.map(|age| age > window).unwrap_or(false);
        let alive = self.info.as_ref().map(|info| holder_alive(info.pid)).unwrap_or(false);
        old_enough && !alive
    }

    fn describe(&self) -> String {
        self.info
            .as_ref()
            .map(MarkerInfo::describe)
            .unwrap_or_else(|| "unreadable".to_string())
    }
}

/// An acquired transaction. Dropping it releases the marker.
#[derive(Debug)]
pub struct Transaction {
    marker: PathBuf,
    released: bool,
}

impl Transaction {
    /// Acquire the marker, failing with `TransactionInProgress` if it exists
    ///
    /// With `stale_after` set, a marker older than the window whose holder
    /// process is gone is removed and acquisition is retried once.
    pub fn begin(paths: &VoltPaths, stale_after: Option<Duration>) -> Result<Self> {
        let marker = paths.trx_lock();
        if let Some(parent) = marker.parent() {
            fs::create_dir_all(parent)?;
        }

        match Self::create(&marker) {
            Err(VoltError::TransactionInProgress { holder, .. }) => {
                let snapshot = MarkerSnapshot::read(&marker);
                let stale = match (&snapshot, stale_after) {
                    (Some(snapshot), Some(window)) => snapshot.is_stale(window),
                    _ => false,
                };
                let Some(snapshot) = snapshot.filter(|_| stale) else {
                    return Err(VoltError::TransactionInProgress { marker, holder });
                };

                tracing::warn!(
                    "Reclaiming stale transaction marker {} ({})",
                    marker.display(),
                    snapshot.describe()
                );
                if !reclaim(&marker, &snapshot)? {
                    return Err(VoltError::TransactionInProgress {
                        holder: MarkerInfo::read(&marker).map(|info| info.describe()),
                        marker,
                    });
                }
                Self::create(&marker)
            }
            other => other,
        }
    }

    fn create(marker: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(marker) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(VoltError::TransactionInProgress {
                    marker: marker.to_path_buf(),
                    holder: MarkerInfo::read(marker).map(|info| info.describe()),
                });
            }
            Err(e) => return Err(e.into()),
        };

        // From here on the guard owns the marker, so a failed write still cleans up
        let guard = Self {
            marker: marker.to_path_buf(),
            released: false,
        };
        let content = serde_json::to_string(&MarkerInfo::current())
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        tracing::debug!("Began transaction ({})", marker.display());
        Ok(guard)
    }

    /// Path of the marker file held by this transaction
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Release the marker and report any failure to remove it
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_marker(&self.marker)?;
        tracing::debug!("Ended transaction ({})", self.marker.display());
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_marker(&self.marker) {
            tracing::error!(
                "Failed to remove transaction marker {}: {}",
                self.marker.display(),
                e
            );
        }
    }
}

fn remove_marker(marker: &Path) -> std::io::Result<()> {
    match fs::remove_file(marker) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove the marker judged stale, unless it was replaced since
///
/// The marker is first renamed to a name private to this process, so the
/// file checked is the file deleted. If it no longer matches `judged`,
/// another process took over in the meantime and the marker is put back.
fn reclaim(marker: &Path, judged: &MarkerSnapshot) -> Result<bool> {
    let aside = marker.with_extension(format!("stale.{}", std::process::id()));
    match fs::rename(marker, &aside) {
        Ok(()) => {}
        // Already reclaimed by someone else; the create decides who wins
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    if MarkerSnapshot::read(&aside).as_ref() == Some(judged) {
        fs::remove_file(&aside)?;
        return Ok(true);
    }

    tracing::debug!(
        "Transaction marker {} changed while reclaiming, restoring it",
        marker.display()
    );
    if let Err(e) = fs::hard_link(&aside, marker) {
        tracing::error!(
            "Failed to restore transaction marker {}: {}",
            marker.display(),
            e
        );
    }
    fs::remove_file(&aside)?;
    Ok(false)
}

#[cfg(unix)]
fn holder_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks that the process exists and may be signalled
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn holder_alive(_pid: u32) -> bool {
    false
}
