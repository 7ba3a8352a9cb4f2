//! Detection of unregistered repository directories
//!
//! An import copies files before lock.json is written. If the process dies
//! in between, the copied directory stays under `$VOLTPATH/repos` without a
//! record, and a later import of the same path fails because the
//! destination exists. These directories are reported here and only
//! removed on explicit request.

use std::path::PathBuf;
use walkdir::WalkDir;

use crate::lockjson::LockJson;
use crate::paths::{ReposPath, VoltPaths};
use crate::Result;

/// A repository directory with no lock.json record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub repos_path: ReposPath,
    pub dir: PathBuf,
}

/// List `host/user/name` directories under the repos tree that lock.json does not know
pub fn find_orphans(paths: &VoltPaths, lock: &LockJson) -> Result<Vec<Orphan>> {
    if !paths.repos_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut orphans = Vec::new();
    for entry in WalkDir::new(&paths.repos_dir)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(repos_path) = paths.repos_path_of(entry.path()) else {
            continue;
        };
        if !lock.contains_repos(&repos_path) {
            orphans.push(Orphan {
                repos_path,
                dir: entry.into_path(),
            });
        }
    }

    Ok(orphans)
}
