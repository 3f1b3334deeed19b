//! CLI command implementations
//!
//! Every command opens the project, scans it, and returns the run's exit
//! status. Run-fatal failures (bad arguments, unreadable configuration) are
//! returned as errors and reported by `main`.

pub mod report;
pub mod scan;
pub mod sync;

pub use report::run_report;
pub use scan::run_scan;
pub use sync::run_sync;

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use testlink_core::output::{emit_response, ScanSummary};
use testlink_core::{
    FrameworkAdapter, LinkError, ProductionIndex, ProjectConfig, ScanError, ScanReport, Scanner,
    SyncEngine, TestLinkRegistry,
};
use testlink_php::{adapter_for, available_adapters, PhpProductionParser};
use tracing::{debug, info};

use crate::cli::{GlobalArgs, OutputFormat};

// ============================================================================
// Project
// ============================================================================

/// A project opened from the global arguments: configuration plus adapters.
pub struct Project {
    scanner: Scanner,
}

impl Project {
    /// Open the project at `--project-root`.
    pub fn open(global: &GlobalArgs) -> Result<Self, LinkError> {
        let root = &global.project_root;
        if !root.is_dir() {
            return Err(LinkError::invalid_args(format!(
                "project root {} is not a directory",
                root.display()
            )));
        }

        let mut config = ProjectConfig::load(root)?;
        for (directory, namespace) in global.test_mapping.iter().rev() {
            config = config.with_test_mapping(directory, namespace);
        }

        let adapters: Vec<Box<dyn FrameworkAdapter>> = match global.framework.adapter_name() {
            None => available_adapters(root),
            Some(name) => vec![adapter_for(name).ok_or_else(|| {
                LinkError::internal(format!("no adapter registered for '{name}'"))
            })?],
        };
        info!(
            root = %root.display(),
            adapters = ?adapters.iter().map(|a| a.name()).collect::<Vec<_>>(),
            "opened project"
        );

        Ok(Project {
            scanner: Scanner::new(root, config).with_adapters(adapters),
        })
    }

    pub fn root(&self) -> &Path {
        self.scanner.project_root()
    }

    pub fn adapters(&self) -> &[Box<dyn FrameworkAdapter>] {
        self.scanner.adapters()
    }

    /// Scan the test files and the production code.
    pub fn scan(&self) -> Result<Scanned, LinkError> {
        let mut registry = TestLinkRegistry::new();
        let report = self.scanner.scan(&mut registry)?;
        let (production, production_errors) = self.scanner.scan_production(&PhpProductionParser)?;
        debug!(
            tests = registry.len(),
            classes = production.class_count(),
            methods = production.method_count(),
            "scan finished"
        );
        Ok(Scanned {
            registry,
            production,
            report,
            production_errors,
        })
    }
}

/// Both sides of a scanned project.
pub struct Scanned {
    pub registry: TestLinkRegistry,
    pub production: ProductionIndex,
    pub report: ScanReport,
    pub production_errors: Vec<ScanError>,
}

impl Scanned {
    pub fn engine(&self) -> SyncEngine<'_> {
        SyncEngine::new(&self.registry, &self.production)
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary::new(
            &self.report,
            self.production.class_count(),
            self.production.method_count(),
        )
    }

    /// Test-side errors followed by production-side errors.
    pub fn errors(&self) -> Vec<ScanError> {
        let mut errors = self.report.errors.clone();
        errors.extend(self.production_errors.iter().cloned());
        errors
    }
}

// ============================================================================
// Output
// ============================================================================

/// Write `response` to stdout as JSON or through the text writer.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    response: &T,
    write_text: impl FnOnce(&mut io::StdoutLock<'static>, &T) -> io::Result<()>,
) -> Result<(), LinkError> {
    let mut stdout = io::stdout().lock();
    let written = match format {
        OutputFormat::Json => emit_response(response, &mut stdout),
        OutputFormat::Text => write_text(&mut stdout, response),
    };
    written
        .and_then(|()| stdout.flush())
        .map_err(|e| LinkError::internal(format!("failed to write output: {e}")))
}
