//! JSON and text output for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** every JSON response has `status` as its first field
//!    (`ok`, `findings` or `error`)
//! 2. **Deterministic:** same input, same output (findings and files sorted)
//! 3. **Versioned:** every response carries [`SCHEMA_VERSION`]
//!
//! Text output carries the same data as a human-readable summary: files
//! skipped due to parse errors, files skipped due to IO errors, then the
//! sorted findings.

use std::io::{self, Write};

use serde::Serialize;

use crate::error::{ExitStatus, LinkError};
use crate::scanner::{ScanError, ScanErrorKind, ScanReport};
use crate::sync::{CoverageEntry, FileChange, Finding, SyncAction, SyncOutcome, SyncPlan, ValidationReport};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

/// Status string for a run with the given exit status.
pub fn status_for(exit: ExitStatus) -> &'static str {
    match exit {
        ExitStatus::Clean => "ok",
        ExitStatus::Findings => "findings",
        ExitStatus::Fatal => "error",
    }
}

/// Exit status implied by findings and collected file errors.
pub fn exit_status(findings: usize, errors: usize) -> ExitStatus {
    if findings == 0 && errors == 0 {
        ExitStatus::Clean
    } else {
        ExitStatus::Findings
    }
}

// ============================================================================
// Response Structs
// ============================================================================

/// Scan statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// Test files matched by the adapters' globs.
    pub files_matched: usize,
    /// Test files parsed.
    pub files_parsed: usize,
    /// Test files skipped without error.
    pub files_skipped: usize,
    /// Tests registered.
    pub tests: usize,
    /// Production classes indexed.
    pub production_classes: usize,
    /// Production methods indexed.
    pub production_methods: usize,
}

impl ScanSummary {
    /// Build from a scan report plus production counts.
    pub fn new(report: &ScanReport, production_classes: usize, production_methods: usize) -> Self {
        ScanSummary {
            files_matched: report.files_matched,
            files_parsed: report.files_parsed,
            files_skipped: report.files_skipped,
            tests: report.tests_found,
            production_classes,
            production_methods,
        }
    }
}

/// Response for the `scan` command.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    /// Status: "ok" or "findings".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Scan statistics.
    pub summary: ScanSummary,
    /// Sorted findings.
    pub findings: Vec<Finding>,
    /// Collected file errors.
    pub errors: Vec<ScanError>,
}

impl ScanResponse {
    /// Create a scan response.
    pub fn new(summary: ScanSummary, report: &ValidationReport, errors: Vec<ScanError>) -> Self {
        let exit = exit_status(report.len(), errors.len());
        ScanResponse {
            status: status_for(exit).to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            summary,
            findings: report.findings.clone(),
            errors,
        }
    }

    /// Exit status of the scan run.
    pub fn exit_status(&self) -> ExitStatus {
        exit_status(self.findings.len(), self.errors.len())
    }
}

/// Response for the `sync` command.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    /// Status: "ok" or "findings".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// True when nothing was written.
    pub dry_run: bool,
    /// Planned actions.
    pub actions: Vec<SyncAction>,
    /// Changed files with hashes and diffs.
    pub changes: Vec<FileChange>,
    /// Findings left unresolved by the plan (dangling links, orphans, ...).
    pub unresolved: Vec<Finding>,
    /// Collected file errors (scan and apply).
    pub errors: Vec<ScanError>,
}

impl SyncResponse {
    /// Create a sync response.
    pub fn new(
        plan: &SyncPlan,
        outcome: SyncOutcome,
        unresolved: Vec<Finding>,
        mut errors: Vec<ScanError>,
    ) -> Self {
        errors.extend(outcome.errors);
        let exit = exit_status(unresolved.len(), errors.len());
        SyncResponse {
            status: status_for(exit).to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            dry_run: outcome.dry_run,
            actions: plan.actions.clone(),
            changes: outcome.changes,
            unresolved,
            errors,
        }
    }

    /// Exit status of the sync run.
    pub fn exit_status(&self) -> ExitStatus {
        exit_status(self.unresolved.len(), self.errors.len())
    }
}

/// Response for the `report` command.
#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    /// Status: "ok" or "findings".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Production method → linking tests.
    pub methods: Vec<CoverageEntry>,
    /// Collected file errors.
    pub errors: Vec<ScanError>,
}

impl ReportResponse {
    /// Create a report response.
    pub fn new(methods: Vec<CoverageEntry>, errors: Vec<ScanError>) -> Self {
        let exit = exit_status(0, errors.len());
        ReportResponse {
            status: status_for(exit).to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            methods,
            errors,
        }
    }

    /// Exit status of the report run.
    pub fn exit_status(&self) -> ExitStatus {
        exit_status(0, self.errors.len())
    }
}

/// Error information for error responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Exit code of the failed run.
    pub code: u8,
    /// Machine-readable kind (`config_error`, ...).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// File concerned, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Error response for run-fatal errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a LinkError.
    pub fn from_error(err: &LinkError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo {
                code: err.exit_status().code(),
                kind: err.kind().to_string(),
                message: err.to_string(),
                path: err.path().map(|p| p.display().to_string()),
            },
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Write the file-error and findings sections of a text summary.
pub fn write_problems(
    writer: &mut impl Write,
    findings: &[Finding],
    errors: &[ScanError],
) -> io::Result<()> {
    for (kind, title) in [
        (ScanErrorKind::Parse, "Skipped (parse errors)"),
        (ScanErrorKind::Io, "Skipped (IO errors)"),
        (ScanErrorKind::Modify, "Not modified (rewrite errors)"),
    ] {
        let of_kind: Vec<&ScanError> = errors.iter().filter(|e| e.kind == kind).collect();
        if of_kind.is_empty() {
            continue;
        }
        writeln!(writer, "{}:", title)?;
        for error in of_kind {
            writeln!(writer, "  {}: {}", error.path.display(), error.message)?;
        }
    }

    if !findings.is_empty() {
        writeln!(writer, "Findings:")?;
        for finding in findings {
            let target = finding
                .target
                .as_ref()
                .map(|t| t.canonical())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                writer,
                "  [{}] {} <- {}: {}",
                finding.kind, target, finding.test, finding.message
            )?;
        }
    }
    Ok(())
}

/// Write the text summary of a scan.
pub fn write_scan_text(writer: &mut impl Write, response: &ScanResponse) -> io::Result<()> {
    let s = &response.summary;
    writeln!(
        writer,
        "Scanned {} test files ({} parsed, {} skipped): {} tests; {} production classes, {} methods",
        s.files_matched, s.files_parsed, s.files_skipped, s.tests, s.production_classes, s.production_methods
    )?;
    write_problems(writer, &response.findings, &response.errors)?;
    if response.findings.is_empty() && response.errors.is_empty() {
        writeln!(writer, "All links are consistent.")?;
    } else {
        writeln!(
            writer,
            "{} findings, {} file errors",
            response.findings.len(),
            response.errors.len()
        )?;
    }
    Ok(())
}

/// Write the text summary of a sync.
pub fn write_sync_text(writer: &mut impl Write, response: &SyncResponse) -> io::Result<()> {
    if response.dry_run {
        for change in &response.changes {
            write!(writer, "{}", change.diff)?;
        }
    }
    for action in &response.actions {
        writeln!(writer, "{}: {}", action.file().display(), action)?;
    }
    let verb = if response.dry_run { "would change" } else { "changed" };
    writeln!(writer, "{} actions, {} {} files", response.actions.len(), verb, response.changes.len())?;
    write_problems(writer, &response.unresolved, &response.errors)
}

/// Write the text coverage map.
pub fn write_report_text(writer: &mut impl Write, response: &ReportResponse) -> io::Result<()> {
    for entry in &response.methods {
        writeln!(writer, "{} ({})", entry.method, entry.file.display())?;
        if entry.tests.is_empty() {
            writeln!(writer, "  (no linking tests)")?;
        }
        for test in &entry.tests {
            let marker = if test.with_coverage { "covers" } else { "links" };
            writeln!(writer, "  {} {}", marker, test.test)?;
        }
    }
    write_problems(writer, &[], &response.errors)
}

// ============================================================================
// Tests
// ============================================================================
