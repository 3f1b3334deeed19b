//! The consistency and sync engine.
//!
//! Validation cross-references the registry (test → targets) against the
//! production index (method → back-references) and classifies every
//! discrepancy as a [`Finding`]. Sync turns fixable findings into a
//! [`SyncPlan`] and applies it file by file.
//!
//! ## Classification
//!
//! For every `(test, target)` declared in the registry:
//! - target exists and names the test: consistent
//! - target method exists, no back-reference to the test: `MissingTestedBy`
//! - target class or method absent: `DanglingLink` (never auto-fixed)
//! - class-level target: consistent when the class exists
//!
//! For every back-reference in production code:
//! - no registered test matches: `OrphanedBackReference`
//! - the named test exists but does not link the method: `MissingTestLink`
//!   (single-test references only)
//!
//! Identifiers registered twice are reported as `DuplicateTest`.
//!
//! ## Applying
//!
//! Actions are grouped per file. Each file is read once, every action for it
//! is applied to the in-memory text (modifiers re-locate their test on the
//! updated text), and the result is written once. A failure on one file
//! leaves that file untouched and is collected; other files proceed.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::adapter::{BackReferenceWriter, FrameworkAdapter};
use crate::diff::unified_diff;
use crate::error::{LinkError, ModifyError};
use crate::link::{LinkIdentifier, ParsedTestCase, TestReference};
use crate::patch::ContentHash;
use crate::registry::{ProductionIndex, TestLinkRegistry};
use crate::scanner::ScanError;

// ============================================================================
// Findings
// ============================================================================

/// Kind of inconsistency between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// A test links an existing method that does not name it back.
    MissingTestedBy,
    /// A back-reference names an existing test that does not link back.
    MissingTestLink,
    /// A test links a class or method that does not exist.
    DanglingLink,
    /// A back-reference names a test that does not exist.
    OrphanedBackReference,
    /// A test identifier was registered more than once.
    DuplicateTest,
}

impl FindingKind {
    /// True when sync can resolve findings of this kind.
    pub fn is_fixable(&self) -> bool {
        matches!(self, FindingKind::MissingTestedBy | FindingKind::MissingTestLink)
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingKind::MissingTestedBy => "missing_tested_by",
            FindingKind::MissingTestLink => "missing_test_link",
            FindingKind::DanglingLink => "dangling_link",
            FindingKind::OrphanedBackReference => "orphaned_back_reference",
            FindingKind::DuplicateTest => "duplicate_test",
        };
        f.write_str(name)
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// What is inconsistent.
    pub kind: FindingKind,
    /// Production class or method concerned (absent for duplicate tests).
    pub target: Option<LinkIdentifier>,
    /// Test identifier, or the back-reference as written for orphans.
    pub test: String,
    /// File where the finding is anchored (test file, or production file for
    /// back-reference findings).
    pub file: Option<PathBuf>,
    /// Human-readable description.
    pub message: String,
}

impl Finding {
    fn sort_key(&self) -> (Option<String>, &str, FindingKind) {
        (
            self.target.as_ref().map(LinkIdentifier::canonical),
            self.test.as_str(),
            self.kind,
        )
    }
}

/// Sorted findings of one validation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Findings sorted by canonical target, then test, then kind.
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Build a report, sorting and deduplicating `findings`.
    pub fn new(mut findings: Vec<Finding>) -> Self {
        findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        findings.dedup();
        ValidationReport { findings }
    }

    /// True when nothing was found.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Number of findings.
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// True when there are no findings.
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Number of findings of `kind`.
    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }

    /// Findings of `kind`, in report order.
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }
}

// ============================================================================
// Sync Plan
// ============================================================================

/// Options controlling how findings are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOptions {
    /// Compute changes and diffs without writing.
    pub dry_run: bool,
    /// Add test links as link-only declarations instead of coverage links.
    pub link_only: bool,
    /// Resolve `MissingTestedBy` by removing the test's link rather than by
    /// adding a back-reference.
    pub prune: bool,
}

/// One source rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    /// Add a back-reference to a production method.
    AddBackReference {
        file: PathBuf,
        method: LinkIdentifier,
        test: TestReference,
    },
    /// Add a link declaration to a test.
    AddTestLink {
        file: PathBuf,
        framework: String,
        #[serde(skip)]
        case: ParsedTestCase,
        test: String,
        target: LinkIdentifier,
        with_coverage: bool,
    },
    /// Remove a link declaration from a test.
    RemoveTestLink {
        file: PathBuf,
        framework: String,
        #[serde(skip)]
        case: ParsedTestCase,
        test: String,
        target: LinkIdentifier,
    },
}

impl SyncAction {
    /// The file this action rewrites.
    pub fn file(&self) -> &Path {
        match self {
            SyncAction::AddBackReference { file, .. }
            | SyncAction::AddTestLink { file, .. }
            | SyncAction::RemoveTestLink { file, .. } => file,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::AddBackReference { method, test, .. } => {
                write!(f, "add back-reference {} on {}", test, method)
            }
            SyncAction::AddTestLink {
                test,
                target,
                with_coverage,
                ..
            } => {
                let kind = if *with_coverage { "coverage link" } else { "link" };
                write!(f, "add {} {} on {}", kind, target, test)
            }
            SyncAction::RemoveTestLink { test, target, .. } => {
                write!(f, "remove link {} from {}", target, test)
            }
        }
    }
}

/// Ordered actions resolving a report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    /// Actions in finding order.
    pub actions: Vec<SyncAction>,
}

impl SyncPlan {
    /// True when there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Actions grouped by file (sorted), keeping plan order within a file.
    pub fn by_file(&self) -> BTreeMap<&Path, Vec<&SyncAction>> {
        let mut grouped: BTreeMap<&Path, Vec<&SyncAction>> = BTreeMap::new();
        for action in &self.actions {
            grouped.entry(action.file()).or_default().push(action);
        }
        grouped
    }
}

/// A file rewritten (or, in dry-run mode, that would be rewritten).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    /// Root-relative path.
    pub path: PathBuf,
    /// Number of actions applied to the file.
    pub actions: usize,
    /// Hash of the content before the change.
    pub before: ContentHash,
    /// Hash of the content after the change.
    pub after: ContentHash,
    /// Unified diff of the change.
    pub diff: String,
}

/// Result of applying a plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    /// True when nothing was written.
    pub dry_run: bool,
    /// Changed files, sorted by path.
    pub changes: Vec<FileChange>,
    /// Files that could not be read, rewritten or written.
    pub errors: Vec<ScanError>,
}

impl SyncOutcome {
    /// Concatenated unified diff of every change.
    pub fn diff(&self) -> String {
        self.changes.iter().map(|c| c.diff.as_str()).collect()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Cross-references a registry and a production index.
pub struct SyncEngine<'a> {
    registry: &'a TestLinkRegistry,
    production: &'a ProductionIndex,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine over a populated registry and production index.
    pub fn new(registry: &'a TestLinkRegistry, production: &'a ProductionIndex) -> Self {
        SyncEngine {
            registry,
            production,
        }
    }

    /// Classify every discrepancy between the two sides.
    pub fn validate(&self) -> ValidationReport {
        let _span = info_span!("validate").entered();
        let mut findings = Vec::new();
        self.check_test_links(&mut findings);
        self.check_back_references(&mut findings);
        self.check_duplicates(&mut findings);
        let report = ValidationReport::new(findings);
        debug!(findings = report.len(), "validation finished");
        report
    }

    fn check_test_links(&self, findings: &mut Vec<Finding>) {
        for (test, links) in self.registry.links_by_test() {
            let file = self.registry.get(test).map(|r| r.file.clone());
            for link in links {
                let target = &link.target;
                if target.is_class_level() {
                    if !self.production.has_class(&target.class_name) {
                        findings.push(Finding {
                            kind: FindingKind::DanglingLink,
                            target: Some(target.clone()),
                            test: test.clone(),
                            file: file.clone(),
                            message: format!("class {} does not exist", target.class_name),
                        });
                    }
                    continue;
                }

                match self.production.method(target) {
                    None => {
                        let message = if self.production.has_class(&target.class_name) {
                            format!("method {} does not exist", target)
                        } else {
                            format!("class {} does not exist", target.class_name)
                        };
                        findings.push(Finding {
                            kind: FindingKind::DanglingLink,
                            target: Some(target.clone()),
                            test: test.clone(),
                            file: file.clone(),
                            message,
                        });
                    }
                    Some(entry) if !entry.tested_by.iter().any(|r| r.matches(test)) => {
                        findings.push(Finding {
                            kind: FindingKind::MissingTestedBy,
                            target: Some(target.clone()),
                            test: test.clone(),
                            file: file.clone(),
                            message: format!("{} links {} but has no back-reference", test, target),
                        });
                    }
                    Some(_) => {}
                }
            }
        }
    }

    fn check_back_references(&self, findings: &mut Vec<Finding>) {
        for (method, entry) in self.production.methods() {
            for reference in &entry.tested_by {
                let matched = self.registry.matching(reference);
                if matched.is_empty() {
                    findings.push(Finding {
                        kind: FindingKind::OrphanedBackReference,
                        target: Some(method.clone()),
                        test: reference.to_string(),
                        file: Some(entry.file.clone()),
                        message: format!("{} names unknown test {}", method, reference),
                    });
                    continue;
                }
                if reference.test_method.is_none() {
                    continue;
                }
                for record in matched {
                    let test = &record.case.qualified_identifier;
                    let class = method.class_identifier();
                    let links_back = self
                        .registry
                        .links_for_test(test)
                        .iter()
                        .any(|l| &l.target == method || l.target == class);
                    if !links_back {
                        findings.push(Finding {
                            kind: FindingKind::MissingTestLink,
                            target: Some(method.clone()),
                            test: test.clone(),
                            file: Some(record.file.clone()),
                            message: format!("{} names {} but the test does not link it", method, test),
                        });
                    }
                }
            }
        }
    }

    fn check_duplicates(&self, findings: &mut Vec<Finding>) {
        for (test, count) in self.registry.duplicates() {
            let file = self.registry.get(&test).map(|r| r.file.clone());
            findings.push(Finding {
                kind: FindingKind::DuplicateTest,
                target: None,
                message: format!("{} is declared {} times", test, count),
                test,
                file,
            });
        }
    }

    /// Turn fixable findings into actions.
    pub fn plan(&self, report: &ValidationReport, options: &SyncOptions) -> SyncPlan {
        let mut actions = Vec::new();
        for finding in &report.findings {
            let Some(target) = &finding.target else {
                continue;
            };
            let Some(record) = self.registry.get(&finding.test) else {
                continue;
            };
            match finding.kind {
                FindingKind::MissingTestedBy if options.prune => {
                    actions.push(SyncAction::RemoveTestLink {
                        file: record.file.clone(),
                        framework: record.framework.clone(),
                        case: record.case.clone(),
                        test: finding.test.clone(),
                        target: target.clone(),
                    });
                }
                FindingKind::MissingTestedBy => {
                    if let Some(entry) = self.production.method(target) {
                        actions.push(SyncAction::AddBackReference {
                            file: entry.file.clone(),
                            method: target.clone(),
                            test: TestReference::for_test(&finding.test),
                        });
                    }
                }
                FindingKind::MissingTestLink => {
                    actions.push(SyncAction::AddTestLink {
                        file: record.file.clone(),
                        framework: record.framework.clone(),
                        case: record.case.clone(),
                        test: finding.test.clone(),
                        target: target.clone(),
                        with_coverage: !options.link_only,
                    });
                }
                _ => {}
            }
        }
        SyncPlan { actions }
    }

    /// Apply `plan` under `project_root`.
    ///
    /// Test-side actions use the modifier of the adapter named by the
    /// record's framework; production-side actions use `writer`.
    pub fn apply(
        &self,
        plan: &SyncPlan,
        project_root: &Path,
        adapters: &[Box<dyn FrameworkAdapter>],
        writer: &dyn BackReferenceWriter,
        options: &SyncOptions,
    ) -> SyncOutcome {
        let _span = info_span!("apply", actions = plan.len(), dry_run = options.dry_run).entered();
        let mut outcome = SyncOutcome {
            dry_run: options.dry_run,
            ..SyncOutcome::default()
        };

        for (relative, actions) in plan.by_file() {
            let absolute = project_root.join(relative);
            let before = match fs::read_to_string(&absolute) {
                Ok(text) => text,
                Err(e) => {
                    let err = LinkError::io(relative, e);
                    warn!("{}", err);
                    outcome.errors.push(ScanError::from_error(relative, &err));
                    continue;
                }
            };

            let after = match apply_to_text(&before, &actions, adapters, writer) {
                Ok(text) => text,
                Err(source) => {
                    let err = LinkError::Modify {
                        path: relative.to_path_buf(),
                        source,
                    };
                    warn!("{}", err);
                    outcome.errors.push(ScanError::from_error(relative, &err));
                    continue;
                }
            };

            if after == before {
                debug!(path = %relative.display(), "no change");
                continue;
            }

            if !options.dry_run {
                if let Err(e) = fs::write(&absolute, &after) {
                    let err = LinkError::io(relative, e);
                    warn!("{}", err);
                    outcome.errors.push(ScanError::from_error(relative, &err));
                    continue;
                }
                info!(path = %relative.display(), actions = actions.len(), "wrote");
            }

            outcome.changes.push(FileChange {
                path: relative.to_path_buf(),
                actions: actions.len(),
                before: ContentHash::compute(before.as_bytes()),
                after: ContentHash::compute(after.as_bytes()),
                diff: unified_diff(&relative.to_string_lossy(), &before, &after),
            });
        }

        outcome
    }
}

/// Apply every action for one file to its text.
fn apply_to_text(
    source: &str,
    actions: &[&SyncAction],
    adapters: &[Box<dyn FrameworkAdapter>],
    writer: &dyn BackReferenceWriter,
) -> Result<String, ModifyError> {
    let mut text = source.to_string();
    for action in actions {
        debug!("{}", action);
        text = match action {
            SyncAction::AddBackReference { method, test, .. } => {
                writer.inject_back_references(&text, method, std::slice::from_ref(test))?
            }
            SyncAction::AddTestLink {
                framework,
                case,
                target,
                with_coverage,
                ..
            } => {
                let modifier = modifier_for(adapters, framework, case)?;
                modifier.inject_links(&text, case, &[target.canonical()], *with_coverage)?
            }
            SyncAction::RemoveTestLink {
                framework,
                case,
                target,
                ..
            } => {
                let modifier = modifier_for(adapters, framework, case)?;
                modifier.remove_links(&text, case, &[target.canonical()])?
            }
        };
    }
    Ok(text)
}

fn modifier_for<'a>(
    adapters: &'a [Box<dyn FrameworkAdapter>],
    framework: &str,
    case: &ParsedTestCase,
) -> Result<&'a dyn crate::adapter::SourceModifier, ModifyError> {
    adapters
        .iter()
        .find(|a| a.name() == framework)
        .map(|a| a.modifier())
        .filter(|m| m.supports(case))
        .ok_or_else(|| ModifyError::Unsupported {
            modifier: framework.to_string(),
            syntax: case.syntax.to_string(),
        })
}

// ============================================================================
// Coverage Map
// ============================================================================

/// A test linking a production method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkingTest {
    /// Test identifier.
    pub test: String,
    /// True for coverage links.
    pub with_coverage: bool,
}

/// Production method → tests, as reported by `report`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageEntry {
    /// The production method.
    pub method: LinkIdentifier,
    /// File declaring the method.
    pub file: PathBuf,
    /// Tests linking the method (directly or through a class-level link).
    pub tests: Vec<LinkingTest>,
    /// Back-references declared on the method.
    pub tested_by: Vec<String>,
}

impl SyncEngine<'_> {
    /// Coverage map of every production method, optionally restricted to one.
    pub fn coverage(&self, only: Option<&LinkIdentifier>) -> Vec<CoverageEntry> {
        let mut entries = Vec::new();
        for (method, entry) in self.production.methods() {
            if only.is_some_and(|o| o != method && !(o.is_class_level() && o.class_name == method.class_name)) {
                continue;
            }
            let class = method.class_identifier();
            let mut tests: BTreeMap<String, bool> = BTreeMap::new();
            for target in [method, &class] {
                for test in self.registry.tests_for(target) {
                    let with_coverage = self
                        .registry
                        .links_for_test(test)
                        .iter()
                        .any(|l| &l.target == target && l.with_coverage);
                    let slot = tests.entry(test.to_string()).or_insert(false);
                    *slot |= with_coverage;
                }
            }
            entries.push(CoverageEntry {
                method: method.clone(),
                file: entry.file.clone(),
                tests: tests
                    .into_iter()
                    .map(|(test, with_coverage)| LinkingTest {
                        test,
                        with_coverage,
                    })
                    .collect(),
                tested_by: entry.tested_by.iter().map(|r| r.to_string()).collect(),
            });
        }
        entries
    }
}

// ============================================================================
// Tests
// ============================================================================
