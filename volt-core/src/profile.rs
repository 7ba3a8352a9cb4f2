//! Profile lookup and membership
//!
//! A profile is a named set of enabled repository paths. Membership changes
//! here know nothing about repository records; callers that need
//! referential checks do them before calling in.

use serde::{Deserialize, Serialize};

use crate::lockjson::LockJson;
use crate::paths::ReposPath;
use crate::{Result, VoltError};

/// Name of the profile created with a fresh lock.json
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// A named set of enabled repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    /// Enabled repository paths, kept in insertion order without duplicates
    #[serde(default)]
    pub repos_path: Vec<ReposPath>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repos_path: Vec::new(),
        }
    }

    pub fn contains(&self, repos_path: &ReposPath) -> bool {
        self.repos_path.contains(repos_path)
    }

    /// Enable a repository in this profile
    ///
    /// Returns false when it was already enabled; the profile is left untouched.
    pub fn add_repos(&mut self, repos_path: &ReposPath) -> bool {
        if self.contains(repos_path) {
            return false;
        }
        self.repos_path.push(repos_path.clone());
        true
    }
}

/// Look up a profile by name
pub fn find_profile<'a>(lock: &'a LockJson, name: &str) -> Result<&'a Profile> {
    lock.profiles
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| VoltError::ProfileNotFound {
            name: name.to_string(),
        })
}

/// Look up a profile by name for modification
pub fn find_profile_mut<'a>(lock: &'a mut LockJson, name: &str) -> Result<&'a mut Profile> {
    lock.profiles
        .iter_mut()
        .find(|p| p.name == name)
        .ok_or_else(|| VoltError::ProfileNotFound {
            name: name.to_string(),
        })
}

/// The profile named by `current_profile_name`
pub fn current_profile_mut(lock: &mut LockJson) -> Result<&mut Profile> {
    let name = lock.current_profile_name.clone();
    find_profile_mut(lock, &name)
}
