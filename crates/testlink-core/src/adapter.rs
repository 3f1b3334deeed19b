//! Framework adapter traits: the seams between the core and a concrete syntax.
//!
//! A framework is supported by implementing three pieces:
//!
//! 1. A [`TestParser`] that turns source text into [`ParsedTestCase`] values
//! 2. A [`SourceModifier`] that adds or removes declarations in source text
//! 3. A [`FrameworkAdapter`] that bundles both with discovery rules
//!
//! Nothing else in the core changes when a framework is added. The
//! production side has its own pair of traits, [`ProductionParser`] and
//! [`BackReferenceWriter`], since production declarations use a single,
//! simpler syntax.
//!
//! # Identifier Scope
//!
//! Parsers produce *file-relative* identifiers (`Class::method`, or a slug
//! path for untitled-style tests). The scanner qualifies them with the
//! namespace resolved from the project's autoload mappings.
//!
//! # Text In, Text Out
//!
//! Modifiers receive the current file text and return new text. They never
//! touch the file system, which keeps them testable on in-memory fixtures
//! and lets the sync engine batch every change to a file into a single
//! read and a single write.

use std::fs;
use std::path::Path;

use crate::error::{LinkError, ModifyError, SyntaxError};
use crate::link::{LinkIdentifier, ParsedTestCase, ProductionClass, TestReference};

// ============================================================================
// Test Side
// ============================================================================

/// Extracts tests and their declared links from one declaration syntax.
pub trait TestParser {
    /// Cheap, path-based check; never opens the file.
    fn supports(&self, path: &Path) -> bool;

    /// Extract every test from in-memory source text.
    fn find_all_tests(&self, source: &str) -> Result<Vec<ParsedTestCase>, SyntaxError>;

    /// Read and parse a file.
    ///
    /// Well-formed files without tests yield an empty list.
    fn parse_file(&self, path: &Path) -> Result<Vec<ParsedTestCase>, LinkError> {
        let source = fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
        self.find_all_tests(&source)
            .map_err(|e| LinkError::parse(path, e.to_string()))
    }

    /// Find a test by name.
    ///
    /// Matches the full name first, then the last ` > `-separated segment of
    /// nested names.
    fn find_test_by_name(
        &self,
        source: &str,
        name: &str,
    ) -> Result<Option<ParsedTestCase>, SyntaxError> {
        let tests = self.find_all_tests(source)?;
        let exact = tests.iter().position(|t| t.name == name);
        let index = exact.or_else(|| tests.iter().position(|t| leaf_name(&t.name) == name));
        Ok(index.map(|i| tests[i].clone()))
    }
}

/// Separator between nested group titles in a test name.
pub const GROUP_SEPARATOR: &str = " > ";

/// The innermost segment of a nested test name.
pub fn leaf_name(name: &str) -> &str {
    name.rsplit(GROUP_SEPARATOR).next().unwrap_or(name)
}

/// Find `case` among tests freshly parsed from the current text.
///
/// Spans recorded at scan time go stale once an earlier edit lands in the
/// same file, so modifiers re-parse and relocate. Candidates must share the
/// name; the one at the recorded offset wins, then one whose file-relative
/// identifier is a suffix of the qualified one, then the first.
pub fn relocate(candidates: Vec<ParsedTestCase>, case: &ParsedTestCase) -> Option<ParsedTestCase> {
    let named: Vec<ParsedTestCase> = candidates
        .into_iter()
        .filter(|c| c.name == case.name)
        .collect();
    let qualified = case.qualified_identifier.as_str();
    let suffix_of = |c: &ParsedTestCase| {
        let rel = c.qualified_identifier.as_str();
        qualified == rel
            || qualified.ends_with(&format!("\\{rel}"))
            || qualified.ends_with(&format!("::{rel}"))
    };
    let index = named
        .iter()
        .position(|c| c.span.start == case.span.start && suffix_of(c))
        .or_else(|| named.iter().position(|c| suffix_of(c)))
        .or((!named.is_empty()).then_some(0))?;
    named.into_iter().nth(index)
}

/// Rewrites link declarations on one test.
pub trait SourceModifier {
    /// True when this modifier handles the test's declaration syntax.
    fn supports(&self, case: &ParsedTestCase) -> bool;

    /// Add declarations for every method in `methods` that the test does not
    /// already declare, upgrading link-only declarations when `with_coverage`.
    ///
    /// `methods` are canonical link identifiers (`Class` or `Class::method`).
    fn inject_links(
        &self,
        source: &str,
        case: &ParsedTestCase,
        methods: &[String],
        with_coverage: bool,
    ) -> Result<String, ModifyError>;

    /// Remove every declaration whose target is listed in `methods`.
    ///
    /// Returns the input unchanged when nothing matches.
    fn remove_links(
        &self,
        source: &str,
        case: &ParsedTestCase,
        methods: &[String],
    ) -> Result<String, ModifyError>;
}

/// The capability bundle for one test framework.
pub trait FrameworkAdapter {
    /// Stable framework name (`pest`, `phpunit`).
    fn name(&self) -> &'static str;

    /// True when the project at `project_root` uses this framework.
    fn is_available(&self, project_root: &Path) -> bool;

    /// The framework's test parser.
    fn parser(&self) -> &dyn TestParser;

    /// The framework's source modifier.
    fn modifier(&self) -> &dyn SourceModifier;

    /// Glob patterns (relative to the project root) of candidate test files.
    fn test_file_patterns(&self) -> Vec<String>;

    /// True when this framework owns the test file at `path`.
    ///
    /// May read the file; frameworks sharing file patterns are told apart by
    /// content.
    fn owns_test_file(&self, path: &Path) -> bool;

    /// Bootstrap hook for the test runtime.
    ///
    /// Invoked once by test-run bootstrap code, never during scans or syncs.
    fn register_runtime(&self) {}
}

// ============================================================================
// Production Side
// ============================================================================

/// Extracts production classes, methods and their back-references.
pub trait ProductionParser {
    /// Cheap, path-based check; never opens the file.
    fn supports(&self, path: &Path) -> bool;

    /// Extract every class (with fully qualified names) from source text.
    fn find_classes(&self, source: &str) -> Result<Vec<ProductionClass>, SyntaxError>;

    /// Read and parse a file.
    fn parse_file(&self, path: &Path) -> Result<Vec<ProductionClass>, LinkError> {
        let source = fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
        self.find_classes(&source)
            .map_err(|e| LinkError::parse(path, e.to_string()))
    }
}

/// Writes back-references onto production methods.
pub trait BackReferenceWriter {
    /// Add a back-reference to each of `tests` on `method`, skipping those
    /// already declared.
    fn inject_back_references(
        &self,
        source: &str,
        method: &LinkIdentifier,
        tests: &[TestReference],
    ) -> Result<String, ModifyError>;
}

// ============================================================================
// Tests
// ============================================================================
