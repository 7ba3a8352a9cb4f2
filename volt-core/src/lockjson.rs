//! lock.json management ($VOLTPATH/lock.json)
//!
//! lock.json is the single source of truth for installed repositories and
//! profiles. It is read in full at the start of an operation and rewritten
//! in full at the end; there are no incremental updates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::paths::ReposPath;
use crate::profile::{Profile, DEFAULT_PROFILE_NAME};
use crate::{Result, VoltError};

/// Schema version written to lock.json
pub const LOCK_JSON_VERSION: u32 = 2;

/// How a repository is managed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReposType {
    /// Under version control (has a `.git` entry)
    Git,
    /// Plain directory
    Static,
}

/// An installed repository. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repos {
    #[serde(rename = "type")]
    pub repos_type: ReposType,
    /// Transaction that created this record
    pub trx_id: u64,
    pub path: ReposPath,
}

/// The persisted manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockJson {
    pub version: u32,
    /// Incremented once per successful mutating operation
    pub trx_id: u64,
    pub current_profile_name: String,
    #[serde(default)]
    pub repos: Vec<Repos>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Default for LockJson {
    fn default() -> Self {
        Self {
            version: LOCK_JSON_VERSION,
            trx_id: 1,
            current_profile_name: DEFAULT_PROFILE_NAME.to_string(),
            repos: Vec::new(),
            profiles: vec![Profile::new(DEFAULT_PROFILE_NAME)],
        }
    }
}

impl LockJson {
    /// Load lock.json, or the initial manifest if it does not exist yet
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, starting from an empty lock.json", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(VoltError::ManifestRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let lock: LockJson =
            serde_json::from_str(&content).map_err(|e| VoltError::CorruptManifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        lock.validate().map_err(|reason| VoltError::CorruptManifest {
            path: path.to_path_buf(),
            reason,
        })?;

        Ok(lock)
    }

    /// Write lock.json atomically (temporary file in the same directory, then rename)
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let persist_failed = |source: std::io::Error| VoltError::PersistFailed {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(persist_failed)?;

        let mut content = serde_json::to_string_pretty(self)
            .map_err(|e| persist_failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        content.push('\n');

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(persist_failed)?;
        temp.write_all(content.as_bytes()).map_err(persist_failed)?;
        temp.as_file().sync_all().map_err(persist_failed)?;
        temp.persist(path).map_err(|e| persist_failed(e.error))?;

        tracing::debug!("Wrote {} (trx_id {})", path.display(), self.trx_id);
        Ok(())
    }

    /// Check the uniqueness invariants
    fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for repos in &self.repos {
            if !seen.insert(&repos.path) {
                return Err(format!("duplicate repository '{}'", repos.path));
            }
        }

        let mut names = HashSet::new();
        for profile in &self.profiles {
            if !names.insert(profile.name.as_str()) {
                return Err(format!("duplicate profile '{}'", profile.name));
            }
            let mut members = HashSet::new();
            for repos_path in &profile.repos_path {
                if !members.insert(repos_path) {
                    return Err(format!(
                        "profile '{}' lists '{}' more than once",
                        profile.name, repos_path
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn find_repos(&self, repos_path: &ReposPath) -> Option<&Repos> {
        self.repos.iter().find(|r| &r.path == repos_path)
    }

    pub fn contains_repos(&self, repos_path: &ReposPath) -> bool {
        self.find_repos(repos_path).is_some()
    }

    /// Start a new transaction and return its id
    pub fn next_trx_id(&mut self) -> u64 {
        self.trx_id += 1;
        self.trx_id
    }

    /// Record a new repository under the current transaction id
    pub fn add_repos(&mut self, repos_type: ReposType, path: ReposPath) -> &Repos {
        self.repos.push(Repos {
            repos_type,
            trx_id: self.trx_id,
            path,
        });
        &self.repos[self.repos.len() - 1]
    }
}

/// Where a workflow reads and writes the manifest
pub trait ManifestStore {
    fn load(&self) -> Result<LockJson>;
    fn save(&self, lock: &LockJson) -> Result<()>;
}

/// lock.json at a fixed path
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestStore for LockFile {
    fn load(&self) -> Result<LockJson> {
        LockJson::load_from_path(&self.path)
    }

    fn save(&self, lock: &LockJson) -> Result<()> {
        lock.save_to_path(&self.path)
    }
}
