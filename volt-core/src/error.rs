//! Error types for volt operations
//!
//! Every failure a mutating operation can hit is a distinct variant so the
//! CLI can report it precisely. Messages are written for the end user.

use std::path::PathBuf;
use thiserror::Error;

use crate::paths::ReposPath;

/// Errors raised by the registration and profile workflows
#[derive(Error, Debug)]
pub enum VoltError {
    /// User input could not be turned into a canonical repository path
    #[error("invalid format of repository: {input}\n\nExpected one of:\n  user/name\n  host/user/name\n  https://host/user/name")]
    InvalidReposPath { input: String },

    /// The directory to import does not exist
    #[error("no such a directory: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    /// The directory to import contains the place it would be copied to
    #[error("cannot import {} into itself ({} is inside it)", .from.display(), .to.display())]
    SourceContainsDestination { from: PathBuf, to: PathBuf },

    /// The repository directory is already present under the repos tree
    #[error("the repository already exists: {repos_path} ({})", .path.display())]
    DestinationExists { repos_path: ReposPath, path: PathBuf },

    /// No profile with the requested name
    #[error("profile '{name}' does not exist")]
    ProfileNotFound { name: String },

    /// A repository path was given that has no record in lock.json
    #[error("repository '{repos_path}' is not installed\n\nImport it first with:\n  volt import {repos_path}")]
    ReposNotFound { repos_path: ReposPath },

    /// Another process holds the transaction marker
    #[error("{}", transaction_in_progress_message(.marker, .holder.as_deref()))]
    TransactionInProgress {
        marker: PathBuf,
        holder: Option<String>,
    },

    /// Failed to read lock.json from disk
    #[error("could not read lock.json from {}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// lock.json exists but its content is unusable
    #[error("lock.json is corrupted ({}): {reason}", .path.display())]
    CorruptManifest { path: PathBuf, reason: String },

    /// Failed to write lock.json
    #[error("could not write to lock.json at {}", .path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recursive copy into the repos tree failed partway
    #[error("failed to copy {} to {}", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The runtime directory could not be regenerated
    #[error("could not rebuild {}", .vim_dir.display())]
    RebuildFailed {
        vim_dir: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Failed to load config.yaml
    #[error("invalid configuration in {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    /// Could not determine where volt keeps its files
    #[error("path error: {0}")]
    Path(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VoltError>;

fn transaction_in_progress_message(marker: &std::path::Path, holder: Option<&str>) -> String {
    let mut message = format!(
        "another volt operation is in progress (transaction marker {} exists)",
        marker.display()
    );
    if let Some(holder) = holder {
        message.push_str(&format!("\nHeld by {holder}"));
    }
    message.push_str(
        "\n\nIf no other volt process is running, the marker was left by a crashed\n\
         operation. Remove it manually, or set transaction.stale_after_secs in config.yaml.",
    );
    message
}

impl VoltError {
    /// True for errors caused by the user's arguments rather than the operation
    pub fn is_argument_error(&self) -> bool {
        matches!(self, VoltError::InvalidReposPath { .. })
    }
}
