//! File discovery: glob patterns over a directory walk.
//!
//! Patterns are matched against root-relative paths. Directories in
//! [`DEFAULT_EXCLUDE_DIRS`] are pruned during the walk and never descended.
//! Results are sorted by path so scans are deterministic.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::trace;
use walkdir::{DirEntry, WalkDir};

use crate::error::LinkError;

/// Directories never searched for test or production files.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".phpunit.cache",
    "vendor",
    "node_modules",
    "target",
];

/// Check if a root-relative path lies under an excluded directory.
pub fn should_exclude(relative_path: &Path) -> bool {
    relative_path.components().any(|component| {
        if let std::path::Component::Normal(name) = component {
            let name = name.to_string_lossy();
            DEFAULT_EXCLUDE_DIRS.iter().any(|pattern| name == *pattern)
        } else {
            false
        }
    })
}

/// Build a GlobSet from a list of pattern strings.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet, LinkError> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            LinkError::invalid_args(format!("invalid glob pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }

    builder
        .build()
        .map_err(|e| LinkError::invalid_args(format!("invalid glob set: {}", e)))
}

/// Find every file under `root` matching any of `patterns`.
///
/// Returns root-relative paths, sorted.
pub fn discover_files(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, LinkError> {
    let globs = build_glob_set(patterns)?;
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_excluded_entry(root, entry));

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if globs.is_match(relative) {
            trace!(path = %relative.display(), "matched");
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn is_excluded_entry(root: &Path, entry: &DirEntry) -> bool {
    entry
        .path()
        .strip_prefix(root)
        .map(should_exclude)
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
