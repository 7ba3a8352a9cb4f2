//! Regeneration of the Vim runtime directory from lock.json
//!
//! ```text
//! $VOLTPATH/repos/github.com/tyru/caw.vim
//!            │
//!            ▼  (enabled in the current profile)
//! ~/.vim/pack/volt/start/github.com_tyru_caw.vim
//! ~/.vim/pack/volt/build-info.json
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;

use crate::copy::copy_dir;
use crate::lockjson::{LockJson, ReposType};
use crate::paths::{ReposPath, VoltPaths};
use crate::profile::find_profile;

/// Regenerates derived runtime state after lock.json changed
pub trait Rebuilder {
    fn rebuild(&self, paths: &VoltPaths, lock: &LockJson) -> Result<()>;
}

/// Summary of the last rebuild
#[derive(Debug, Serialize)]
struct BuildInfo<'a> {
    trx_id: u64,
    profile: &'a str,
    built_at: String,
    repos: Vec<BuildInfoRepos<'a>>,
}

#[derive(Debug, Serialize)]
struct BuildInfoRepos<'a> {
    #[serde(rename = "type")]
    repos_type: ReposType,
    path: &'a ReposPath,
    trx_id: u64,
}

/// Copies every repository enabled in the current profile into
/// `<vim_dir>/pack/volt/start`, replacing whatever was there
#[derive(Debug, Default, Clone, Copy)]
pub struct StartDirRebuilder;

impl Rebuilder for StartDirRebuilder {
    fn rebuild(&self, paths: &VoltPaths, lock: &LockJson) -> Result<()> {
        let start_dir = paths.start_dir();
        let profile = find_profile(lock, &lock.current_profile_name)?;

        if start_dir.exists() {
            fs::remove_dir_all(&start_dir)
                .with_context(|| format!("Failed to clear {}", start_dir.display()))?;
        }
        fs::create_dir_all(&start_dir)
            .with_context(|| format!("Failed to create {}", start_dir.display()))?;

        let mut installed = Vec::new();
        for repos_path in &profile.repos_path {
            let Some(repos) = lock.find_repos(repos_path) else {
                tracing::warn!(
                    "Profile '{}' enables '{}' but it is not installed, skipping",
                    profile.name,
                    repos_path
                );
                continue;
            };

            let src = paths.full_repos_path(repos_path);
            let dst = start_dir.join(repos_path.encoded());
            copy_dir(&src, &dst).with_context(|| {
                format!("Failed to install {} into {}", repos_path, dst.display())
            })?;
            tracing::debug!("Installed {} into {}", repos_path, dst.display());

            installed.push(BuildInfoRepos {
                repos_type: repos.repos_type,
                path: &repos.path,
                trx_id: repos.trx_id,
            });
        }

        let info = BuildInfo {
            trx_id: lock.trx_id,
            profile: &profile.name,
            built_at: chrono::Utc::now().to_rfc3339(),
            repos: installed,
        };
        let build_info = paths.build_info();
        fs::write(&build_info, serde_json::to_string_pretty(&info)?)
            .with_context(|| format!("Failed to write {}", build_info.display()))?;

        tracing::info!(
            "Rebuilt {} ({} repositories)",
            start_dir.display(),
            info.repos.len()
        );
        Ok(())
    }
}
