//! Framework adapters: Pest and PHPUnit.
//!
//! Both frameworks share `tests/**/*Test.php`; files are told apart by
//! content. A file declaring a class belongs to PHPUnit, anything else to
//! Pest.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use testlink_core::config::composer_requires;
use testlink_core::{FrameworkAdapter, SourceModifier, TestParser};
use tracing::info;

use crate::pest::{PestModifier, PestParser};
use crate::phpunit::{PhpUnitModifier, PhpUnitParser};

static CLASS_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*(?:(?:abstract|final|readonly)\s+)*class\s+[A-Za-z_]")
        .expect("class declaration pattern")
});

fn declares_class(path: &Path) -> Option<bool> {
    let source = fs::read_to_string(path).ok()?;
    Some(CLASS_DECLARATION.is_match(&source))
}

// ============================================================================
// Pest
// ============================================================================

/// Pest: `test()`/`it()` calls with chained link declarations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PestAdapter {
    parser: PestParser,
    modifier: PestModifier,
}

impl PestAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameworkAdapter for PestAdapter {
    fn name(&self) -> &'static str {
        "pest"
    }

    fn is_available(&self, project_root: &Path) -> bool {
        composer_requires(project_root, "pestphp/pest")
            || project_root.join("tests").join("Pest.php").is_file()
    }

    fn parser(&self) -> &dyn TestParser {
        &self.parser
    }

    fn modifier(&self) -> &dyn SourceModifier {
        &self.modifier
    }

    fn test_file_patterns(&self) -> Vec<String> {
        vec![
            "tests/**/*Test.php".to_string(),
            "tests/**/*.test.php".to_string(),
        ]
    }

    fn owns_test_file(&self, path: &Path) -> bool {
        declares_class(path) == Some(false)
    }

    fn register_runtime(&self) {
        info!(framework = self.name(), "link declarations are no-ops at test run time");
    }
}

// ============================================================================
// PHPUnit
// ============================================================================

/// PHPUnit: test classes with attribute-list link declarations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpUnitAdapter {
    parser: PhpUnitParser,
    modifier: PhpUnitModifier,
}

impl PhpUnitAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameworkAdapter for PhpUnitAdapter {
    fn name(&self) -> &'static str {
        "phpunit"
    }

    fn is_available(&self, project_root: &Path) -> bool {
        composer_requires(project_root, "phpunit/phpunit")
            || project_root.join("phpunit.xml").is_file()
            || project_root.join("phpunit.xml.dist").is_file()
    }

    fn parser(&self) -> &dyn TestParser {
        &self.parser
    }

    fn modifier(&self) -> &dyn SourceModifier {
        &self.modifier
    }

    fn test_file_patterns(&self) -> Vec<String> {
        vec!["tests/**/*Test.php".to_string()]
    }

    fn owns_test_file(&self, path: &Path) -> bool {
        declares_class(path) == Some(true)
    }

    fn register_runtime(&self) {
        info!(framework = self.name(), "link attributes are no-ops at test run time");
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Every supported framework, in detection order.
pub fn all_adapters() -> Vec<Box<dyn FrameworkAdapter>> {
    vec![Box::new(PestAdapter::new()), Box::new(PhpUnitAdapter::new())]
}

/// The adapter named `name` (`pest`, `phpunit`).
pub fn adapter_for(name: &str) -> Option<Box<dyn FrameworkAdapter>> {
    all_adapters()
        .into_iter()
        .find(|a| a.name().eq_ignore_ascii_case(name))
}

/// Adapters whose framework the project uses, falling back to all of them
/// when none is detected.
pub fn available_adapters(project_root: &Path) -> Vec<Box<dyn FrameworkAdapter>> {
    let (available, missing): (Vec<_>, Vec<_>) = all_adapters()
        .into_iter()
        .partition(|a| a.is_available(project_root));
    if available.is_empty() {
        missing
    } else {
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ownership_by_content() {
        let dir = TempDir::new().unwrap();
        let pest = dir.path().join("PestTest.php");
        let unit = dir.path().join("UnitTest.php");
        fs::write(&pest, "<?php\ntest('x', fn () => true);\n").unwrap();
        fs::write(&unit, "<?php\nfinal class UnitTest extends TestCase {}\n").unwrap();

        assert!(PestAdapter::new().owns_test_file(&pest));
        assert!(!PestAdapter::new().owns_test_file(&unit));
        assert!(PhpUnitAdapter::new().owns_test_file(&unit));
        assert!(!PhpUnitAdapter::new().owns_test_file(&pest));
        assert!(!PestAdapter::new().owns_test_file(&dir.path().join("missing.php")));
    }

    #[test]
    fn detection_from_composer_and_markers() {
        let dir = TempDir::new().unwrap();
        assert_eq!(available_adapters(dir.path()).len(), 2);

        fs::write(
            dir.path().join("composer.json"),
            r#"{"require-dev": {"pestphp/pest": "^3.0"}}"#,
        )
        .unwrap();
        let names: Vec<&str> = available_adapters(dir.path()).iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["pest"]);

        fs::write(dir.path().join("phpunit.xml"), "<phpunit/>").unwrap();
        assert_eq!(available_adapters(dir.path()).len(), 2);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(adapter_for("PHPUnit").map(|a| a.name()), Some("phpunit"));
        assert!(adapter_for("jest").is_none());
    }
}
