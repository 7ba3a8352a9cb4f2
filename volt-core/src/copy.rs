//! Recursive directory copy
//!
//! Stops at the first I/O error. Whatever was copied before the error stays
//! on disk; callers decide what to do about it.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Copy the tree at `src` to `dst`, creating `dst` and its parents
///
/// Symlinks are recreated as symlinks on Unix and followed elsewhere.
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", src.display()),
        ));
    }

    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    tracing::debug!("Copied {} to {}", src.display(), dst.display());
    Ok(())
}

/// Whether `path` is `dir` or lies beneath it, after resolving symlinks
///
/// `path` need not exist yet; it is resolved through its nearest
/// resolvable ancestor.
pub fn is_within(path: &Path, dir: &Path) -> io::Result<bool> {
    let dir = dir.canonicalize()?;

    let mut existing = path;
    let mut missing = Vec::new();
    let mut resolved = loop {
        let candidate = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        match candidate.canonicalize() {
            Ok(resolved) => break resolved,
            Err(e) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = parent;
                }
                _ => return Err(e),
            },
        }
    };
    resolved.extend(missing.iter().rev());
    Ok(resolved.starts_with(&dir))
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    if link.is_dir() {
        copy_dir(link, target)
    } else {
        fs::copy(link, target).map(|_| ())
    }
}
