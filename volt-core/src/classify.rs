use std::path::Path;

use crate::lockjson::ReposType;

/// Version-control marker looked for directly under a repository
const VCS_MARKER: &str = ".git";

/// Decide how a repository directory is managed
///
/// Only the top level is inspected; a nested `.git` deeper in the tree does
/// not make the repository version controlled. The result is stored in
/// lock.json at registration time and never recomputed.
pub fn detect_repos_type(dir: &Path) -> ReposType {
    if dir.join(VCS_MARKER).exists() {
        ReposType::Git
    } else {
        ReposType::Static
    }
}
