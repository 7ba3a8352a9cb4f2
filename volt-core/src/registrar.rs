//! Mutating operations on lock.json
//!
//! Every operation here follows the same cycle:
//!
//! ```text
//! begin transaction ─► load lock.json ─► mutate in memory ─► save once ─► rebuild ─► release
//! ```
//!
//! The transaction guard is released on every path after it was acquired,
//! including errors from any later step. lock.json is never written twice
//! in one operation, and a failed rebuild does not undo the save.
//!
//! Filesystem changes (the copied repository directory) are not rolled
//! back. See `reconcile` for finding directories left by a failed import.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::classify::detect_repos_type;
use crate::copy::{copy_dir, is_within};
use crate::lockjson::{LockFile, LockJson, ManifestStore, Repos, ReposType};
use crate::paths::{ReposPath, VoltPaths};
use crate::profile::{current_profile_mut, find_profile, find_profile_mut};
use crate::rebuild::Rebuilder;
use crate::reconcile::{find_orphans, Orphan};
use crate::transaction::Transaction;
use crate::{Result, VoltError};

/// What an enable or profile add changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileChange {
    pub profile: String,
    /// Newly enabled, in request order
    pub added: Vec<ReposPath>,
    /// Requested but already enabled
    pub unchanged: Vec<ReposPath>,
}

impl ProfileChange {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }
}

/// Record a new repository and enable it in the current profile
///
/// The current profile is resolved before anything changes, so a
/// `ProfileNotFound` leaves `lock` untouched. On success the transaction id
/// has been incremented exactly once and tags the new record.
pub fn register_repos(
    lock: &mut LockJson,
    repos_type: ReposType,
    repos_path: &ReposPath,
) -> Result<Repos> {
    find_profile(lock, &lock.current_profile_name)?;
    if lock.contains_repos(repos_path) {
        return Err(VoltError::DestinationExists {
            repos_path: repos_path.clone(),
            path: repos_path.as_str().into(),
        });
    }

    lock.next_trx_id();
    let repos = lock.add_repos(repos_type, repos_path.clone()).clone();
    current_profile_mut(lock)?.add_repos(repos_path);
    Ok(repos)
}

/// Enable installed repositories in the named profile
///
/// Every path must have a repository record; otherwise `ReposNotFound` is
/// returned and `lock` is untouched. The transaction id is incremented once
/// if at least one path was newly enabled.
pub fn enable_repos(
    lock: &mut LockJson,
    profile_name: &str,
    repos_paths: &[ReposPath],
) -> Result<ProfileChange> {
    if let Some(missing) = repos_paths.iter().find(|p| !lock.contains_repos(p)) {
        return Err(VoltError::ReposNotFound {
            repos_path: missing.clone(),
        });
    }

    let profile = find_profile_mut(lock, profile_name)?;
    let mut change = ProfileChange {
        profile: profile.name.clone(),
        added: Vec::new(),
        unchanged: Vec::new(),
    };
    for repos_path in repos_paths {
        if profile.add_repos(repos_path) {
            change.added.push(repos_path.clone());
        } else {
            change.unchanged.push(repos_path.clone());
        }
    }

    if !change.is_noop() {
        lock.next_trx_id();
    }
    Ok(change)
}

/// Runs mutating operations against one volt installation
pub struct Registrar<'a> {
    paths: &'a VoltPaths,
    rebuilder: &'a dyn Rebuilder,
    store: Box<dyn ManifestStore + 'a>,
    stale_after: Option<Duration>,
}

impl<'a> Registrar<'a> {
    pub fn new(paths: &'a VoltPaths, rebuilder: &'a dyn Rebuilder) -> Self {
        Self {
            paths,
            rebuilder,
            store: Box::new(LockFile::new(paths.lock_json())),
            stale_after: None,
        }
    }

    /// Read and write the manifest through `store` instead of lock.json
    pub fn with_store(mut self, store: impl ManifestStore + 'a) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Allow reclaiming transaction markers abandoned by dead processes
    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Copy the local directory `from` into the repos tree as `repos_path`
    /// and register it
    pub fn import(&self, from: &Path, repos_path: &ReposPath) -> Result<Repos> {
        if !from.is_dir() {
            return Err(VoltError::SourceNotFound {
                path: from.to_path_buf(),
            });
        }
        let dst = self.paths.full_repos_path(repos_path);
        self.ensure_absent(repos_path, &dst)?;
        if is_within(&dst, from)? {
            return Err(VoltError::SourceContainsDestination {
                from: from.to_path_buf(),
                to: dst,
            });
        }

        let trx = self.begin()?;
        // Another process may have created it before we got the marker
        self.ensure_absent(repos_path, &dst)?;
        let mut lock = self.load()?;
        if lock.contains_repos(repos_path) {
            return Err(VoltError::DestinationExists {
                repos_path: repos_path.clone(),
                path: dst,
            });
        }

        tracing::info!("Importing '{}' as '{}' ...", from.display(), repos_path);
        copy_dir(from, &dst).map_err(|source| VoltError::CopyFailed {
            from: from.to_path_buf(),
            to: dst.clone(),
            source,
        })?;

        let repos = self.commit_registration(&mut lock, &dst, repos_path)?;
        trx.release()?;
        Ok(repos)
    }

    /// Register a directory already placed at `repos_path` in the repos tree
    pub fn import_in_place(&self, repos_path: &ReposPath) -> Result<Repos> {
        let dir = self.paths.full_repos_path(repos_path);
        if !dir.is_dir() {
            return Err(VoltError::SourceNotFound { path: dir });
        }

        let trx = self.begin()?;
        let mut lock = self.load()?;
        tracing::info!("Importing '{}' ...", repos_path);
        let repos = self.commit_registration(&mut lock, &dir, repos_path)?;
        trx.release()?;
        Ok(repos)
    }

    /// Enable installed repositories in the current profile
    pub fn enable(&self, repos_paths: &[ReposPath]) -> Result<ProfileChange> {
        self.add_to_profile(None, repos_paths)
    }

    /// Enable installed repositories in a profile (the current one if `None`)
    ///
    /// lock.json is written only if something was newly enabled. The rebuild
    /// runs whenever the target is the current profile.
    pub fn add_to_profile(
        &self,
        profile_name: Option<&str>,
        repos_paths: &[ReposPath],
    ) -> Result<ProfileChange> {
        let trx = self.begin()?;
        let mut lock = self.load()?;
        let profile_name = profile_name
            .map(str::to_string)
            .unwrap_or_else(|| lock.current_profile_name.clone());

        let change = enable_repos(&mut lock, &profile_name, repos_paths)?;
        for repos_path in &change.unchanged {
            tracing::info!(
                "'{}' is already enabled in profile '{}'",
                repos_path,
                change.profile
            );
        }
        // A no-op batch persists nothing but still rebuilds
        if !change.is_noop() {
            self.save(&lock)?;
        }
        if change.profile == lock.current_profile_name {
            self.rebuild(&lock)?;
        }
        trx.release()?;
        Ok(change)
    }

    /// Delete repository directories that lock.json does not know about
    pub fn remove_orphans(&self) -> Result<Vec<Orphan>> {
        let trx = self.begin()?;
        let lock = self.load()?;
        let orphans = find_orphans(self.paths, &lock)?;
        for orphan in &orphans {
            tracing::info!("Removing unregistered {}", orphan.dir.display());
            fs::remove_dir_all(&orphan.dir)?;
        }
        trx.release()?;
        Ok(orphans)
    }

    fn commit_registration(
        &self,
        lock: &mut LockJson,
        dir: &Path,
        repos_path: &ReposPath,
    ) -> Result<Repos> {
        let repos_type = detect_repos_type(dir);
        let repos = register_repos(lock, repos_type, repos_path)?;
        tracing::debug!(
            "Registered {} as {:?} (trx_id {})",
            repos.path,
            repos.repos_type,
            repos.trx_id
        );
        self.save(lock)?;
        self.rebuild(lock)?;
        Ok(repos)
    }

    fn ensure_absent(&self, repos_path: &ReposPath, dst: &Path) -> Result<()> {
        // Dangling symlinks count as present
        if fs::symlink_metadata(dst).is_ok() {
            return Err(VoltError::DestinationExists {
                repos_path: repos_path.clone(),
                path: dst.to_path_buf(),
            });
        }
        Ok(())
    }

    fn begin(&self) -> Result<Transaction> {
        Transaction::begin(self.paths, self.stale_after)
    }

    fn load(&self) -> Result<LockJson> {
        self.store.load()
    }

    fn save(&self, lock: &LockJson) -> Result<()> {
        self.store.save(lock)
    }

    fn rebuild(&self, lock: &LockJson) -> Result<()> {
        self.rebuilder
            .rebuild(self.paths, lock)
            .map_err(|source| VoltError::RebuildFailed {
                vim_dir: self.paths.vim_dir.clone(),
                source,
            })
    }
}
