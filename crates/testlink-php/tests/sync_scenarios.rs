//! End-to-end scan, validate and sync over temporary PHP projects.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use testlink_core::{
    FindingKind, ProductionIndex, ProjectConfig, ScanErrorKind, ScanReport, Scanner, SyncEngine,
    SyncOptions, SyncOutcome, TestLinkRegistry, ValidationReport,
};
use testlink_php::{all_adapters, PhpProductionParser, TestedByWriter};

// ============================================================================
// Fixtures
// ============================================================================

const COMPOSER: &str = r#"{
    "autoload": { "psr-4": { "App\\": "src/" } },
    "autoload-dev": { "psr-4": { "Tests\\": "tests/" } },
    "require-dev": { "pestphp/pest": "^3.0", "phpunit/phpunit": "^11.0" }
}"#;

const USER_SERVICE: &str = r#"<?php

namespace App\Services;

class UserService
{
    public function create(array $data): array
    {
        return $data;
    }

    public function validate(array $data): bool
    {
        return true;
    }
}
"#;

const UNIT_TEST: &str = r#"<?php

namespace Tests\Unit;

use App\Services\UserService;
use PHPUnit\Framework\TestCase;

final class UserServiceTest extends TestCase
{
    #[LinksAndCovers(UserService::class, 'create')]
    public function test_creates_user(): void
    {
        $this->assertTrue(true);
    }

    public function test_validates(): void
    {
        $this->assertTrue(true);
    }
}
"#;

const PEST_TEST: &str = r#"<?php

use App\Services\UserService;

test('it creates a user', function () {
    expect(true)->toBeTrue();
})->linksAndCovers(UserService::class.'::create');
"#;

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let project = Project {
            dir: TempDir::new().unwrap(),
        };
        project.write("composer.json", COMPOSER);
        project.write("src/Services/UserService.php", USER_SERVICE);
        project
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, relative: &str, text: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root().join(relative)).unwrap()
    }

    fn scanner(&self) -> Scanner {
        let config = ProjectConfig::load(self.root()).unwrap();
        Scanner::new(self.root(), config).with_adapters(all_adapters())
    }

    fn scan(&self) -> (TestLinkRegistry, ProductionIndex, ScanReport) {
        let scanner = self.scanner();
        let mut registry = TestLinkRegistry::new();
        let report = scanner.scan(&mut registry).unwrap();
        let (production, errors) = scanner.scan_production(&PhpProductionParser).unwrap();
        assert!(errors.is_empty(), "production errors: {errors:?}");
        (registry, production, report)
    }

    fn validate(&self) -> ValidationReport {
        let (registry, production, _) = self.scan();
        SyncEngine::new(&registry, &production).validate()
    }

    fn sync(&self, options: &SyncOptions) -> (usize, SyncOutcome) {
        let scanner = self.scanner();
        let (registry, production, _) = self.scan();
        let engine = SyncEngine::new(&registry, &production);
        let plan = engine.plan(&engine.validate(), options);
        let outcome = engine.apply(
            &plan,
            self.root(),
            scanner.adapters(),
            &TestedByWriter,
            options,
        );
        (plan.len(), outcome)
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn missing_back_reference_is_the_only_finding() {
    let project = Project::new();
    project.write("tests/Unit/UserServiceTest.php", UNIT_TEST);

    let report = project.validate();
    assert_eq!(report.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.kind, FindingKind::MissingTestedBy);
    assert_eq!(finding.test, "Tests\\Unit\\UserServiceTest::test_creates_user");
    assert_eq!(
        finding.target.as_ref().map(|t| t.canonical()),
        Some("App\\Services\\UserService::create".to_string())
    );
}

#[test]
fn sync_writes_back_reference_and_converges() {
    let project = Project::new();
    project.write("tests/Unit/UserServiceTest.php", UNIT_TEST);

    let (planned, outcome) = project.sync(&SyncOptions::default());
    assert_eq!(planned, 1);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.changes.len(), 1);
    assert!(project.read("src/Services/UserService.php").contains(
        "    #[TestedBy('Tests\\Unit\\UserServiceTest', 'test_creates_user')]\n    public function create"
    ));

    assert!(project.validate().is_clean());
    let (planned, outcome) = project.sync(&SyncOptions::default());
    assert_eq!(planned, 0);
    assert!(outcome.changes.is_empty());
}

#[test]
fn pest_and_phpunit_tests_share_a_production_method() {
    let project = Project::new();
    project.write("tests/Unit/UserServiceTest.php", UNIT_TEST);
    project.write("tests/Feature/UserFlowTest.php", PEST_TEST);

    let report = project.validate();
    assert_eq!(report.count(FindingKind::MissingTestedBy), 2);
    assert!(report
        .findings
        .iter()
        .any(|f| f.test == "Tests\\Feature\\UserFlowTest::it_creates_a_user"));

    let (_, outcome) = project.sync(&SyncOptions::default());
    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.changes[0].actions, 2);
    let production = project.read("src/Services/UserService.php");
    assert!(production.contains("#[TestedBy('Tests\\Feature\\UserFlowTest', 'it_creates_a_user')]"));
    assert!(production.contains("#[TestedBy('Tests\\Unit\\UserServiceTest', 'test_creates_user')]"));
    assert!(project.validate().is_clean());
}

#[test]
fn back_reference_without_test_link_adds_the_link() {
    let project = Project::new();
    project.write("tests/Unit/UserServiceTest.php", UNIT_TEST);
    project.write(
        "src/Services/UserService.php",
        &USER_SERVICE
            .replace(
                "    public function create",
                "    #[TestedBy('Tests\\Unit\\UserServiceTest', 'test_creates_user')]\n    public function create",
            )
            .replace(
                "    public function validate",
                "    #[TestedBy('Tests\\Unit\\UserServiceTest', 'test_validates')]\n    public function validate",
            ),
    );

    let report = project.validate();
    assert_eq!(report.len(), 1);
    assert_eq!(report.findings[0].kind, FindingKind::MissingTestLink);

    project.sync(&SyncOptions::default());
    assert!(project.read("tests/Unit/UserServiceTest.php").contains(
        "    #[LinksAndCovers(UserService::class, 'validate')]\n    public function test_validates"
    ));
    assert!(project.validate().is_clean());
}

#[test]
fn link_only_sync_adds_plain_links() {
    let project = Project::new();
    project.write("tests/Unit/UserServiceTest.php", UNIT_TEST);
    project.write(
        "src/Services/UserService.php",
        &USER_SERVICE.replace(
            "    public function validate",
            "    #[TestedBy('Tests\\Unit\\UserServiceTest', 'test_validates')]\n    public function validate",
        ),
    );
    let options = SyncOptions {
        link_only: true,
        ..SyncOptions::default()
    };
    project.sync(&options);
    assert!(project
        .read("tests/Unit/UserServiceTest.php")
        .contains("#[Links(UserService::class, 'validate')]"));
}

#[test]
fn prune_removes_unreferenced_links() {
    let project = Project::new();
    project.write("tests/Feature/UserFlowTest.php", PEST_TEST);

    let options = SyncOptions {
        prune: true,
        ..SyncOptions::default()
    };
    let (planned, outcome) = project.sync(&options);
    assert_eq!(planned, 1);
    assert!(outcome.errors.is_empty());
    assert!(project
        .read("tests/Feature/UserFlowTest.php")
        .ends_with("    expect(true)->toBeTrue();\n});\n"));
    assert_eq!(project.read("src/Services/UserService.php"), USER_SERVICE);
    assert!(project.validate().is_clean());
}

#[test]
fn dry_run_reports_diff_without_writing() {
    let project = Project::new();
    project.write("tests/Unit/UserServiceTest.php", UNIT_TEST);

    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };
    let (_, outcome) = project.sync(&options);
    assert!(outcome.dry_run);
    assert_eq!(outcome.changes.len(), 1);
    assert_ne!(outcome.changes[0].before, outcome.changes[0].after);
    let diff = outcome.diff();
    assert!(diff.contains("--- a/src/Services/UserService.php"));
    assert!(diff.contains("+    #[TestedBy('Tests\\Unit\\UserServiceTest', 'test_creates_user')]"));
    assert_eq!(project.read("src/Services/UserService.php"), USER_SERVICE);
}

#[test]
fn dangling_links_are_reported_but_never_fixed() {
    let project = Project::new();
    project.write(
        "tests/Unit/UserServiceTest.php",
        &UNIT_TEST.replace("'create'", "'missing'"),
    );

    let report = project.validate();
    assert_eq!(report.len(), 1);
    assert_eq!(report.findings[0].kind, FindingKind::DanglingLink);
    let (planned, outcome) = project.sync(&SyncOptions::default());
    assert_eq!(planned, 0);
    assert!(outcome.changes.is_empty());
}

#[test]
fn orphaned_back_reference_is_reported() {
    let project = Project::new();
    project.write(
        "src/Services/UserService.php",
        &USER_SERVICE.replace(
            "    public function create",
            "    #[TestedBy('Tests\\Unit\\GoneTest', 'test_gone')]\n    public function create",
        ),
    );
    let report = project.validate();
    assert_eq!(report.count(FindingKind::OrphanedBackReference), 1);
    assert!(!report.findings[0].kind.is_fixable());
}

#[test]
fn malformed_test_file_is_collected_and_others_still_parse() {
    let project = Project::new();
    project.write("tests/Unit/UserServiceTest.php", UNIT_TEST);
    project.write(
        "tests/Unit/BrokenTest.php",
        "<?php\nclass BrokenTest {\n    public function test_x() {\n",
    );

    let (registry, _, report) = project.scan();
    assert_eq!(report.files_matched, 2);
    assert_eq!(report.files_parsed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ScanErrorKind::Parse);
    assert!(report.errors[0].path.ends_with("BrokenTest.php"));
    assert_eq!(registry.len(), 2);
}
