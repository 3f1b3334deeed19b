//! The bidirectional link registry and the production-side index.
//!
//! [`TestLinkRegistry`] owns every [`TestRecord`] discovered in one scan. Two
//! derived views are computed on first use and dropped on every insertion:
//!
//! - `links_by_test`: test identifier → declared links, in source order
//! - `tests_by_production_method`: link target → identifiers of the tests
//!   declaring it
//!
//! The views are never edited directly, so they always agree with the
//! records. Only the scanner writes (through `&mut`); every other consumer
//! borrows the registry immutably.
//!
//! [`ProductionIndex`] is the mirror image for production code: production
//! method → file and declared back-references, plus the set of known classes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;
use tracing::warn;

use crate::link::{
    DeclaredLink, LinkIdentifier, ProductionClass, TestRecord, TestReference,
};

// ============================================================================
// Test Link Registry
// ============================================================================

/// In-memory index over every test discovered in a scan.
#[derive(Debug, Default)]
pub struct TestLinkRegistry {
    records: Vec<TestRecord>,
    links_by_test: OnceLock<BTreeMap<String, Vec<DeclaredLink>>>,
    tests_by_production_method: OnceLock<BTreeMap<LinkIdentifier, BTreeSet<String>>>,
}

impl TestLinkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, invalidating the derived views.
    pub fn insert(&mut self, record: TestRecord) {
        self.records.push(record);
        self.links_by_test = OnceLock::new();
        self.tests_by_production_method = OnceLock::new();
    }

    /// Number of records, duplicates included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no test has been registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record, in insertion order.
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    /// The first record registered under `qualified_identifier`.
    pub fn get(&self, qualified_identifier: &str) -> Option<&TestRecord> {
        self.records
            .iter()
            .find(|r| r.case.qualified_identifier == qualified_identifier)
    }

    /// True when a test with this identifier is registered.
    pub fn contains(&self, qualified_identifier: &str) -> bool {
        self.links_by_test().contains_key(qualified_identifier)
    }

    /// Test identifier → declared links.
    ///
    /// Links of duplicate identifiers are concatenated in insertion order.
    pub fn links_by_test(&self) -> &BTreeMap<String, Vec<DeclaredLink>> {
        self.links_by_test.get_or_init(|| {
            let mut map: BTreeMap<String, Vec<DeclaredLink>> = BTreeMap::new();
            for record in &self.records {
                map.entry(record.case.qualified_identifier.clone())
                    .or_default()
                    .extend(record.case.existing_links.iter().cloned());
            }
            map
        })
    }

    /// Link target → identifiers of tests declaring it.
    pub fn tests_by_production_method(&self) -> &BTreeMap<LinkIdentifier, BTreeSet<String>> {
        self.tests_by_production_method.get_or_init(|| {
            let mut map: BTreeMap<LinkIdentifier, BTreeSet<String>> = BTreeMap::new();
            for record in &self.records {
                for link in &record.case.existing_links {
                    map.entry(link.target.clone())
                        .or_default()
                        .insert(record.case.qualified_identifier.clone());
                }
            }
            map
        })
    }

    /// Declared links of one test (empty when unknown).
    pub fn links_for_test(&self, qualified_identifier: &str) -> &[DeclaredLink] {
        self.links_by_test()
            .get(qualified_identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Identifiers of the tests linking to `target`, sorted.
    pub fn tests_for(&self, target: &LinkIdentifier) -> Vec<&str> {
        self.tests_by_production_method()
            .get(target)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Records matching a production back-reference.
    pub fn matching(&self, reference: &TestReference) -> Vec<&TestRecord> {
        self.records
            .iter()
            .filter(|r| reference.matches(&r.case.qualified_identifier))
            .collect()
    }

    /// Identifiers registered more than once, with their counts.
    pub fn duplicates(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            *counts.entry(&record.case.qualified_identifier).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, n)| (id.to_string(), n))
            .collect()
    }
}

// ============================================================================
// Production Index
// ============================================================================

/// Where a production method lives and which tests it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionEntry {
    /// File declaring the method (relative to the project root).
    pub file: PathBuf,
    /// Back-references declared on the method, in source order.
    pub tested_by: Vec<TestReference>,
}

/// Production classes and methods discovered by a production scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductionIndex {
    classes: BTreeMap<String, PathBuf>,
    methods: BTreeMap<LinkIdentifier, ProductionEntry>,
}

impl ProductionIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class parsed from `file`.
    ///
    /// A class name seen twice keeps its first file.
    pub fn insert_class(&mut self, file: &Path, class: ProductionClass) {
        if let Some(existing) = self.classes.get(&class.name) {
            warn!(
                class = %class.name,
                first = %existing.display(),
                second = %file.display(),
                "class declared twice, keeping first"
            );
            return;
        }
        self.classes.insert(class.name.clone(), file.to_path_buf());
        for declaration in class.declarations() {
            self.methods.insert(
                declaration.owning_method,
                ProductionEntry {
                    file: file.to_path_buf(),
                    tested_by: declaration.tests,
                },
            );
        }
    }

    /// True when the class is known.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// Look up a method-level identifier.
    pub fn method(&self, id: &LinkIdentifier) -> Option<&ProductionEntry> {
        self.methods.get(id)
    }

    /// True when the link target exists: the class for class-level links,
    /// the method otherwise.
    pub fn contains_target(&self, target: &LinkIdentifier) -> bool {
        if target.is_class_level() {
            self.has_class(&target.class_name)
        } else {
            self.methods.contains_key(target)
        }
    }

    /// Every method, sorted by identifier.
    pub fn methods(&self) -> impl Iterator<Item = (&LinkIdentifier, &ProductionEntry)> {
        self.methods.iter()
    }

    /// Number of known classes.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of known methods.
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DeclarationSyntax, ParsedTestCase, ProductionMethod};
    use crate::patch::Span;

    fn record(qid: &str, links: Vec<DeclaredLink>) -> TestRecord {
        TestRecord {
            file: PathBuf::from("tests/Unit/UserTest.php"),
            framework: "phpunit".to_string(),
            case: ParsedTestCase {
                name: qid.rsplit("::").next().unwrap().to_string(),
                qualified_identifier: qid.to_string(),
                span: Span::new(0, 1),
                declarations_end: 0,
                existing_links: links,
                syntax: DeclarationSyntax::AttributeList,
            },
        }
    }

    fn create() -> LinkIdentifier {
        LinkIdentifier::method("App\\UserService", "create")
    }

    mod indices {
        use super::*;

        #[test]
        fn indices_are_consistent_views() {
            let mut registry = TestLinkRegistry::new();
            registry.insert(record(
                "Tests\\UserTest::test_create",
                vec![DeclaredLink::covering(create())],
            ));
            registry.insert(record(
                "Tests\\UserTest::test_other",
                vec![DeclaredLink::link_only(create())],
            ));

            assert_eq!(registry.links_for_test("Tests\\UserTest::test_create").len(), 1);
            assert_eq!(
                registry.tests_for(&create()),
                vec!["Tests\\UserTest::test_create", "Tests\\UserTest::test_other"]
            );
        }

        #[test]
        fn insertion_invalidates_views() {
            let mut registry = TestLinkRegistry::new();
            registry.insert(record("Tests\\A::test_a", vec![DeclaredLink::covering(create())]));
            assert_eq!(registry.tests_for(&create()).len(), 1);

            registry.insert(record("Tests\\B::test_b", vec![DeclaredLink::covering(create())]));
            assert_eq!(registry.tests_for(&create()).len(), 2);
            assert!(registry.contains("Tests\\B::test_b"));
        }

        #[test]
        fn unknown_lookups_are_empty() {
            let registry = TestLinkRegistry::new();
            assert!(registry.is_empty());
            assert!(registry.links_for_test("nope").is_empty());
            assert!(registry.tests_for(&create()).is_empty());
        }
    }

    mod duplicates {
        use super::*;

        #[test]
        fn duplicates_are_kept_and_reported() {
            let mut registry = TestLinkRegistry::new();
            registry.insert(record("Tests\\A::test_x", vec![DeclaredLink::covering(create())]));
            registry.insert(record("Tests\\A::test_x", vec![]));
            registry.insert(record("Tests\\A::test_y", vec![]));

            assert_eq!(registry.len(), 3);
            assert_eq!(registry.duplicates(), vec![("Tests\\A::test_x".to_string(), 2)]);
            assert_eq!(registry.links_for_test("Tests\\A::test_x").len(), 1);
        }
    }

    #[test]
    fn matching_uses_reference_rules() {
        let mut registry = TestLinkRegistry::new();
        registry.insert(record("Tests\\A::test_x", vec![]));
        registry.insert(record("Tests\\A::test_y", vec![]));
        assert_eq!(registry.matching(&TestReference::container("Tests\\A")).len(), 2);
        assert_eq!(
            registry
                .matching(&TestReference::method("Tests\\A", "test_y"))
                .len(),
            1
        );
    }

    mod production {
        use super::*;

        fn service() -> ProductionClass {
            ProductionClass {
                name: "App\\UserService".to_string(),
                methods: vec![ProductionMethod {
                    name: "create".to_string(),
                    span: Span::new(0, 10),
                    tested_by: vec![TestReference::method("Tests\\UserTest", "test_create")],
                }],
            }
        }

        #[test]
        fn targets_resolve_by_level() {
            let mut index = ProductionIndex::new();
            index.insert_class(Path::new("src/UserService.php"), service());

            assert!(index.contains_target(&create()));
            assert!(index.contains_target(&LinkIdentifier::class("App\\UserService")));
            assert!(!index.contains_target(&LinkIdentifier::method("App\\UserService", "nope")));
            assert!(!index.contains_target(&LinkIdentifier::class("App\\Other")));
            assert_eq!(index.method(&create()).unwrap().tested_by.len(), 1);
        }

        #[test]
        fn first_class_declaration_wins() {
            let mut index = ProductionIndex::new();
            index.insert_class(Path::new("src/A.php"), service());
            index.insert_class(Path::new("src/B.php"), service());
            assert_eq!(index.method(&create()).unwrap().file, Path::new("src/A.php"));
            assert_eq!(index.method_count(), 1);
        }
    }
}
