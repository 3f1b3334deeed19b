//! The scanner: discovers test and production files and populates the
//! registry and the production index.
//!
//! Per test file:
//! 1. the first adapter whose globs match and whose `owns_test_file` accepts
//!    the file is selected (no adapter: skipped)
//! 2. a parser that does not `supports` the file skips it silently
//! 3. the namespace is resolved from the autoload mappings
//! 4. every parsed case is qualified and inserted
//!
//! Parse and IO failures become [`ScanError`]s; a scan never aborts on a
//! single file.

use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use serde::Serialize;
use tracing::{debug, info_span, warn};

use crate::adapter::{FrameworkAdapter, ProductionParser};
use crate::config::ProjectConfig;
use crate::error::LinkError;
use crate::files::{build_glob_set, discover_files};
use crate::link::TestRecord;
use crate::registry::{ProductionIndex, TestLinkRegistry};

// ============================================================================
// Scan Errors and Reports
// ============================================================================

/// Category of a collected file error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    /// The file is malformed.
    Parse,
    /// The file could not be read or written.
    Io,
    /// A rewrite of the file failed.
    Modify,
}

/// A file-level error collected during a scan or a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanError {
    /// Root-relative path of the file.
    pub path: PathBuf,
    /// Error category.
    pub kind: ScanErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl ScanError {
    /// Summarise a file-level [`LinkError`], reporting `path` as the file.
    pub fn from_error(path: &Path, err: &LinkError) -> Self {
        let kind = match err {
            LinkError::Io { .. } => ScanErrorKind::Io,
            LinkError::Modify { .. } => ScanErrorKind::Modify,
            _ => ScanErrorKind::Parse,
        };
        let message = match err {
            LinkError::Parse { reason, .. } => reason.clone(),
            LinkError::Io { source, .. } => source.to_string(),
            LinkError::Modify { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        ScanError {
            path: path.to_path_buf(),
            kind,
            message,
        }
    }
}

/// Outcome of a test scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Files matched by the adapters' globs.
    pub files_matched: usize,
    /// Files parsed successfully.
    pub files_parsed: usize,
    /// Files skipped because no adapter owned them or the parser did not
    /// support them.
    pub files_skipped: usize,
    /// Tests inserted into the registry.
    pub tests_found: usize,
    /// Collected parse and IO errors, in file order.
    pub errors: Vec<ScanError>,
}

impl ScanReport {
    /// Paths of files skipped due to parse errors.
    pub fn parse_error_files(&self) -> Vec<&Path> {
        self.errors_of(ScanErrorKind::Parse)
    }

    /// Paths of files skipped due to IO errors.
    pub fn io_error_files(&self) -> Vec<&Path> {
        self.errors_of(ScanErrorKind::Io)
    }

    fn errors_of(&self, kind: ScanErrorKind) -> Vec<&Path> {
        self.errors
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.path.as_path())
            .collect()
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Walks a project and feeds the registry.
pub struct Scanner {
    project_root: PathBuf,
    config: ProjectConfig,
    adapters: Vec<Box<dyn FrameworkAdapter>>,
}

impl Scanner {
    /// Create a scanner without adapters.
    pub fn new(project_root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Scanner {
            project_root: project_root.into(),
            config,
            adapters: Vec::new(),
        }
    }

    /// Add an adapter; earlier adapters win ownership ties.
    pub fn with_adapter(mut self, adapter: Box<dyn FrameworkAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Add several adapters in order.
    pub fn with_adapters(mut self, adapters: Vec<Box<dyn FrameworkAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    /// Change the project root.
    pub fn set_project_root(&mut self, path: impl Into<PathBuf>) {
        self.project_root = path.into();
    }

    /// The project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The autoload configuration in use.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// The registered adapters.
    pub fn adapters(&self) -> &[Box<dyn FrameworkAdapter>] {
        &self.adapters
    }

    /// Scan every test file and insert its tests into `registry`.
    ///
    /// Only argument errors (an invalid glob) abort the scan.
    pub fn scan(&self, registry: &mut TestLinkRegistry) -> Result<ScanReport, LinkError> {
        let _span = info_span!("scan", root = %self.project_root.display()).entered();

        let mut patterns: Vec<String> = Vec::new();
        let mut adapter_globs: Vec<GlobSet> = Vec::new();
        for adapter in &self.adapters {
            let own = adapter.test_file_patterns();
            adapter_globs.push(build_glob_set(&own)?);
            for pattern in own {
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
        }

        let files = discover_files(&self.project_root, &patterns)?;
        let mut report = ScanReport {
            files_matched: files.len(),
            ..ScanReport::default()
        };

        for relative in files {
            let absolute = self.project_root.join(&relative);
            if let Err(e) = fs::File::open(&absolute) {
                let err = LinkError::io(&relative, e);
                warn!("{}", err);
                report.errors.push(ScanError::from_error(&relative, &err));
                continue;
            }

            let owner = self
                .adapters
                .iter()
                .zip(&adapter_globs)
                .find(|(adapter, globs)| globs.is_match(&relative) && adapter.owns_test_file(&absolute))
                .map(|(adapter, _)| adapter);
            let Some(adapter) = owner else {
                debug!(path = %relative.display(), "no adapter owns file, skipped");
                report.files_skipped += 1;
                continue;
            };

            let parser = adapter.parser();
            if !parser.supports(&absolute) {
                debug!(path = %relative.display(), "unsupported by parser, skipped");
                report.files_skipped += 1;
                continue;
            }

            match parser.parse_file(&absolute) {
                Ok(cases) => {
                    let namespace = self.config.resolve_namespace(&relative);
                    debug!(
                        path = %relative.display(),
                        framework = adapter.name(),
                        namespace = %namespace,
                        tests = cases.len(),
                        "parsed"
                    );
                    report.files_parsed += 1;
                    report.tests_found += cases.len();
                    for case in cases {
                        registry.insert(TestRecord {
                            file: relative.clone(),
                            framework: adapter.name().to_string(),
                            case: case.qualify(&namespace),
                        });
                    }
                }
                Err(err) => {
                    warn!("{}", err);
                    report.errors.push(ScanError::from_error(&relative, &err));
                }
            }
        }

        Ok(report)
    }

    /// Scan production directories and build the production index.
    ///
    /// Files under test directories are left out even when a production
    /// mapping covers them.
    pub fn scan_production(
        &self,
        parser: &dyn ProductionParser,
    ) -> Result<(ProductionIndex, Vec<ScanError>), LinkError> {
        let _span = info_span!("scan_production", root = %self.project_root.display()).entered();

        let patterns: Vec<String> = self
            .config
            .production_directories()
            .iter()
            .map(|dir| format!("{dir}**/*.php"))
            .collect();
        let test_dirs = self.config.test_directories();

        let mut index = ProductionIndex::new();
        let mut errors = Vec::new();
        for relative in discover_files(&self.project_root, &patterns)? {
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if test_dirs.iter().any(|d| relative_str.starts_with(d.as_str())) {
                continue;
            }
            let absolute = self.project_root.join(&relative);
            if !parser.supports(&absolute) {
                continue;
            }
            match parser.parse_file(&absolute) {
                Ok(classes) => {
                    debug!(path = %relative.display(), classes = classes.len(), "parsed production file");
                    for class in classes {
                        index.insert_class(&relative, class);
                    }
                }
                Err(err) => {
                    warn!("{}", err);
                    errors.push(ScanError::from_error(&relative, &err));
                }
            }
        }
        Ok((index, errors))
    }
}

// ============================================================================
// Tests
// ============================================================================
