//! Project configuration: PSR-4 autoload mappings and namespace resolution.
//!
//! Mappings come from the project's `composer.json`:
//! - `autoload-dev.psr-4` entries describe where tests live
//! - `autoload.psr-4` entries describe where production code lives
//!
//! A missing `composer.json` is not an error; the defaults below apply. A
//! `composer.json` that exists but does not parse is run-fatal, since every
//! namespace resolution depends on it.
//!
//! ## Normal Form
//!
//! Directories use `/`, have no leading `./` and end with `/` (the project
//! root itself is the empty string). Namespaces end with `\`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LinkError;
use crate::link::NAMESPACE_SEPARATOR;

/// Name of the manifest read from the project root.
pub const COMPOSER_FILE: &str = "composer.json";

/// Directory of the fallback test mapping.
pub const DEFAULT_TEST_DIRECTORY: &str = "tests/";

/// Namespace of the fallback test mapping.
pub const DEFAULT_TEST_NAMESPACE: &str = "Tests\\";

/// Production directories used when no `autoload` mapping is configured.
pub const DEFAULT_PRODUCTION_DIRECTORIES: &[&str] = &["src/", "app/"];

// ============================================================================
// Mappings
// ============================================================================

/// One `directory → namespace` autoload rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoloadMapping {
    /// Directory prefix relative to the project root (normal form).
    pub directory: String,
    /// Namespace prefix (normal form).
    pub namespace: String,
}

impl AutoloadMapping {
    /// Build a mapping, normalising both parts.
    pub fn new(directory: &str, namespace: &str) -> Self {
        AutoloadMapping {
            directory: normalize_directory(directory),
            namespace: normalize_namespace(namespace),
        }
    }

    /// True when `dir` (normal form) lies under this mapping's directory.
    pub fn covers(&self, dir: &str) -> bool {
        dir.starts_with(&self.directory)
    }
}

fn normalize_directory(directory: &str) -> String {
    let mut dir = directory.trim().replace('\\', "/");
    while let Some(rest) = dir.strip_prefix("./") {
        dir = rest.to_string();
    }
    let dir = dir.trim_start_matches('/').trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        String::new()
    } else {
        format!("{dir}/")
    }
}

fn normalize_namespace(namespace: &str) -> String {
    let ns = namespace.trim().trim_matches(NAMESPACE_SEPARATOR);
    if ns.is_empty() {
        String::new()
    } else {
        format!("{ns}{NAMESPACE_SEPARATOR}")
    }
}

// ============================================================================
// composer.json
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ComposerManifest {
    #[serde(default)]
    autoload: AutoloadSection,
    #[serde(default, rename = "autoload-dev")]
    autoload_dev: AutoloadSection,
    #[serde(default)]
    require: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "require-dev")]
    require_dev: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct AutoloadSection {
    #[serde(default, rename = "psr-4")]
    psr4: BTreeMap<String, Psr4Paths>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Psr4Paths {
    One(String),
    Many(Vec<String>),
}

impl AutoloadSection {
    fn mappings(&self) -> Vec<AutoloadMapping> {
        let mut out = Vec::new();
        for (namespace, paths) in &self.psr4 {
            match paths {
                Psr4Paths::One(dir) => out.push(AutoloadMapping::new(dir, namespace)),
                Psr4Paths::Many(dirs) => {
                    out.extend(dirs.iter().map(|dir| AutoloadMapping::new(dir, namespace)))
                }
            }
        }
        out
    }
}

/// True when the project's `composer.json` requires `package`
/// (in `require` or `require-dev`).
///
/// A missing or unreadable manifest requires nothing.
pub fn composer_requires(project_root: &Path, package: &str) -> bool {
    let path = project_root.join(COMPOSER_FILE);
    let Ok(text) = fs::read_to_string(&path) else {
        return false;
    };
    match serde_json::from_str::<ComposerManifest>(&text) {
        Ok(manifest) => {
            manifest.require.contains_key(package) || manifest.require_dev.contains_key(package)
        }
        Err(_) => false,
    }
}

// ============================================================================
// Project Configuration
// ============================================================================

/// Autoload mappings for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// `autoload-dev` mappings, consulted first.
    pub test_mappings: Vec<AutoloadMapping>,
    /// `autoload` mappings.
    pub production_mappings: Vec<AutoloadMapping>,
}

impl ProjectConfig {
    /// Load the configuration of the project at `project_root`.
    pub fn load(project_root: &Path) -> Result<Self, LinkError> {
        let path = project_root.join(COMPOSER_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Self::from_composer_json(&path, &text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no {} under {}, using defaults", COMPOSER_FILE, project_root.display());
                Ok(ProjectConfig::default())
            }
            Err(e) => Err(LinkError::Config {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Parse `composer.json` text; `path` is only used for error reporting.
    pub fn from_composer_json(path: &Path, text: &str) -> Result<Self, LinkError> {
        let manifest: ComposerManifest =
            serde_json::from_str(text).map_err(|e| LinkError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let config = ProjectConfig {
            test_mappings: manifest.autoload_dev.mappings(),
            production_mappings: manifest.autoload.mappings(),
        };
        debug!(
            test_mappings = config.test_mappings.len(),
            production_mappings = config.production_mappings.len(),
            "loaded autoload configuration"
        );
        Ok(config)
    }

    /// Add a test mapping ahead of the configured ones.
    pub fn with_test_mapping(mut self, directory: &str, namespace: &str) -> Self {
        self.test_mappings
            .insert(0, AutoloadMapping::new(directory, namespace));
        self
    }

    /// Resolve the namespace of the file at `relative_path` (relative to the
    /// project root), without a trailing `\`.
    ///
    /// The longest covering directory wins; on ties `autoload-dev` beats
    /// `autoload` and earlier entries beat later ones. Directories below the
    /// matched prefix become namespace segments. Without a covering mapping
    /// the default `tests/ → Tests\` applies, and outside `tests/` the
    /// namespace is `Tests\` plus every directory segment.
    pub fn resolve_namespace(&self, relative_path: &Path) -> String {
        let segments = directory_segments(relative_path);
        let dir: String = segments.iter().map(|s| format!("{s}/")).collect();

        let mut best: Option<&AutoloadMapping> = None;
        for mapping in self.test_mappings.iter().chain(&self.production_mappings) {
            if mapping.covers(&dir)
                && best.is_none_or(|b| mapping.directory.len() > b.directory.len())
            {
                best = Some(mapping);
            }
        }

        let fallback = AutoloadMapping::new(DEFAULT_TEST_DIRECTORY, DEFAULT_TEST_NAMESPACE);
        let mapping = match best {
            Some(mapping) => mapping,
            None if fallback.covers(&dir) => &fallback,
            None => {
                return join_namespace(DEFAULT_TEST_NAMESPACE, &segments);
            }
        };

        let consumed = mapping.directory.matches('/').count();
        join_namespace(&mapping.namespace, &segments[consumed.min(segments.len())..])
    }

    /// Production directories to scan (normal form).
    pub fn production_directories(&self) -> Vec<String> {
        if self.production_mappings.is_empty() {
            return DEFAULT_PRODUCTION_DIRECTORIES
                .iter()
                .map(|d| d.to_string())
                .collect();
        }
        let mut dirs: Vec<String> = self
            .production_mappings
            .iter()
            .map(|m| m.directory.clone())
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Test directories (normal form), used to keep production scans out of
    /// test trees.
    pub fn test_directories(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .test_mappings
            .iter()
            .map(|m| m.directory.clone())
            .filter(|d| !d.is_empty())
            .collect();
        if dirs.is_empty() {
            dirs.push(DEFAULT_TEST_DIRECTORY.to_string());
        }
        dirs
    }
}

/// Normal path components of the parent directory of `relative_path`.
fn directory_segments(relative_path: &Path) -> Vec<String> {
    let parent = relative_path.parent().unwrap_or(Path::new(""));
    parent
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn join_namespace(prefix: &str, segments: &[String]) -> String {
    let mut parts: Vec<&str> = prefix
        .split(NAMESPACE_SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect();
    parts.extend(segments.iter().map(String::as_str));
    parts.join("\\")
}

/// Convert a path under the project root to a root-relative path.
///
/// Paths already relative are returned unchanged.
pub fn relative_to(project_root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(project_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

// ============================================================================
// Tests
// ============================================================================
