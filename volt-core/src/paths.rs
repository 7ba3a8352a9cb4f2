use crate::{Result, VoltError};
use directories::BaseDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable overriding the volt root directory
pub const VOLTPATH_ENV: &str = "VOLTPATH";

/// Host used for `user/name` shorthand
const DEFAULT_HOST: &str = "github.com";

/// Prefix given to imported repositories named without a host
const LOCAL_PREFIX: &str = "localhost/local";

/// Canonical repository identifier, always `host/user/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReposPath(String);

impl ReposPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name used for this repository inside a flat directory
    pub fn encoded(&self) -> String {
        self.0.replace('/', "_")
    }
}

impl fmt::Display for ReposPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReposPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize user input into a canonical repository path
///
/// Accepted forms:
/// - `user/name` (host defaults to github.com)
/// - `host/user/name`
/// - `http(s)://host/user/name`
///
/// A trailing `.git` is removed in every form.
pub fn normalize_repos(input: &str) -> Result<ReposPath> {
    let raw = input.trim().replace('\\', "/");
    let invalid = || VoltError::InvalidReposPath {
        input: input.to_string(),
    };

    let path = if let Some(caps) = repos_url_regex().captures(&raw) {
        format!("{}/{}/{}", &caps[1], &caps[2], &caps[3])
    } else {
        let parts: Vec<&str> = raw.split('/').collect();
        match parts.as_slice() {
            [user, name] => format!("{DEFAULT_HOST}/{user}/{name}"),
            [host, user, name] => format!("{host}/{user}/{name}"),
            _ => return Err(invalid()),
        }
    };

    let path = path.strip_suffix(".git").unwrap_or(&path).to_string();
    if path
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(invalid());
    }

    Ok(ReposPath(path))
}

/// Normalize the target name of `volt import {from} {repository}`
///
/// A bare name is placed under `localhost/local/`.
pub fn normalize_imported_repos(input: &str) -> Result<ReposPath> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && !trimmed.contains('/') && !trimmed.contains('\\') {
        return normalize_repos(&format!("{LOCAL_PREFIX}/{trimmed}"));
    }
    normalize_repos(trimmed)
}

fn repos_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://([^/]+)/([^/]+)/([^/]+?)/?$").expect("valid repository URL regex")
    })
}

/// Filesystem layout of a volt installation
#[derive(Debug, Clone)]
pub struct VoltPaths {
    /// Root directory ($VOLTPATH, default ~/volt)
    pub root: PathBuf,
    /// Managed repositories ($VOLTPATH/repos)
    pub repos_dir: PathBuf,
    /// Vim runtime directory the rebuild writes into (default ~/.vim)
    pub vim_dir: PathBuf,
}

impl VoltPaths {
    /// Resolve the layout from an explicit root, `$VOLTPATH`, or the home directory
    pub fn resolve(root_override: Option<&Path>) -> Result<Self> {
        let home = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| VoltError::Path("Failed to determine home directory".to_string()))?;

        let root = match root_override {
            Some(root) => root.to_path_buf(),
            None => match std::env::var_os(VOLTPATH_ENV) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => home.join("volt"),
            },
        };

        Ok(Self::with_vim_dir(root, home.join(".vim")))
    }

    /// Layout rooted at `root` with an explicit vim directory
    pub fn with_vim_dir(root: PathBuf, vim_dir: PathBuf) -> Self {
        let repos_dir = root.join("repos");
        Self {
            root,
            repos_dir,
            vim_dir,
        }
    }

    /// $VOLTPATH/lock.json
    pub fn lock_json(&self) -> PathBuf {
        self.root.join("lock.json")
    }

    /// Transaction marker file
    pub fn trx_lock(&self) -> PathBuf {
        self.root.join("trx.lock")
    }

    /// $VOLTPATH/config.yaml
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// Directory a repository is stored in
    pub fn full_repos_path(&self, repos_path: &ReposPath) -> PathBuf {
        repos_path
            .as_str()
            .split('/')
            .fold(self.repos_dir.clone(), |dir, part| dir.join(part))
    }

    /// Directory the rebuild regenerates
    pub fn start_dir(&self) -> PathBuf {
        self.vim_dir.join("pack").join("volt").join("start")
    }

    /// Summary written next to the start directory by the rebuild
    pub fn build_info(&self) -> PathBuf {
        self.vim_dir.join("pack").join("volt").join("build-info.json")
    }

    /// Reverse of `full_repos_path` for directories under the repos tree
    pub fn repos_path_of(&self, dir: &Path) -> Option<ReposPath> {
        let relative = dir.strip_prefix(&self.repos_dir).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        match parts.as_slice() {
            [_, _, _] => Some(ReposPath(parts.join("/"))),
            _ => None,
        }
    }
}
