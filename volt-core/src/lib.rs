//! volt core library
//!
//! Tracks installed plugin repositories and the profiles that enable them,
//! all recorded in a single `lock.json` shared by every volt invocation.
//! Mutations run inside an on-disk transaction so concurrent invocations
//! cannot interleave their writes.

pub mod classify;
pub mod config;
pub mod copy;
pub mod error;
pub mod lockjson;
pub mod paths;
pub mod profile;
pub mod rebuild;
pub mod reconcile;
pub mod registrar;
pub mod transaction;

pub use error::{Result, VoltError};
pub use lockjson::{LockFile, LockJson, ManifestStore, Repos, ReposType};
pub use paths::{normalize_imported_repos, normalize_repos, ReposPath, VoltPaths};
pub use registrar::{ProfileChange, Registrar};
