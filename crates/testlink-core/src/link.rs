//! Link model: identifiers, declared links, parsed test cases and link records.
//!
//! These are pure value types. Nothing in this module reads files or knows
//! about a concrete declaration syntax; parsers produce these values and the
//! registry and sync engine consume them.
//!
//! ## Canonical Form
//!
//! A [`LinkIdentifier`] renders as `"Class"` (class-level link) or
//! `"Class::method"`. [`canonical_form`] and [`parse_canonical_form`] are exact
//! inverses for every identifier whose parts contain no `::`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::patch::Span;

/// Separator between class and method in canonical form.
pub const METHOD_SEPARATOR: &str = "::";

/// Separator between namespace segments.
pub const NAMESPACE_SEPARATOR: char = '\\';

// ============================================================================
// Link Identifier
// ============================================================================

/// Error returned when a string is not a valid canonical link identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkParseError {
    /// The class part is empty.
    #[error("empty class name in link '{input}'")]
    EmptyClass { input: String },

    /// A `::` separator is followed by nothing.
    #[error("empty method name in link '{input}'")]
    EmptyMethod { input: String },

    /// More than one `::` separator.
    #[error("too many '::' separators in link '{input}'")]
    TooManySeparators { input: String },
}

/// Nominal reference to a production class or method.
///
/// Equality is exact and case-sensitive. Ordering is by class, then method,
/// with the class-level identifier sorting before any of its methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct LinkIdentifier {
    /// Fully qualified class name, without a leading `\`.
    pub class_name: String,
    /// Method name; `None` for a class-level link.
    pub method_name: Option<String>,
}

impl LinkIdentifier {
    /// Create a method-level identifier.
    pub fn method(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        LinkIdentifier {
            class_name: normalize_class(class_name.into()),
            method_name: Some(method_name.into()),
        }
    }

    /// Create a class-level identifier.
    pub fn class(class_name: impl Into<String>) -> Self {
        LinkIdentifier {
            class_name: normalize_class(class_name.into()),
            method_name: None,
        }
    }

    /// True when this identifier names a whole class.
    pub fn is_class_level(&self) -> bool {
        self.method_name.is_none()
    }

    /// The class-level identifier of this identifier's class.
    pub fn class_identifier(&self) -> LinkIdentifier {
        LinkIdentifier {
            class_name: self.class_name.clone(),
            method_name: None,
        }
    }

    /// Canonical textual form (`Class` or `Class::method`).
    pub fn canonical(&self) -> String {
        canonical_form(self)
    }
}

fn normalize_class(class_name: String) -> String {
    match class_name.strip_prefix(NAMESPACE_SEPARATOR) {
        Some(stripped) => stripped.to_string(),
        None => class_name,
    }
}

/// Render the canonical form of an identifier.
pub fn canonical_form(id: &LinkIdentifier) -> String {
    match &id.method_name {
        Some(method) => format!("{}{}{}", id.class_name, METHOD_SEPARATOR, method),
        None => id.class_name.clone(),
    }
}

/// Parse a canonical form back into an identifier.
///
/// A single leading `\` on the class name is dropped, so `\App\Foo::bar` and
/// `App\Foo::bar` denote the same method.
pub fn parse_canonical_form(input: &str) -> Result<LinkIdentifier, LinkParseError> {
    let trimmed = input.trim();
    match trimmed.split_once(METHOD_SEPARATOR) {
        None => {
            let class = normalize_class(trimmed.to_string());
            if class.is_empty() {
                return Err(LinkParseError::EmptyClass {
                    input: input.to_string(),
                });
            }
            Ok(LinkIdentifier {
                class_name: class,
                method_name: None,
            })
        }
        Some((class, method)) => {
            let class = normalize_class(class.to_string());
            if class.is_empty() {
                return Err(LinkParseError::EmptyClass {
                    input: input.to_string(),
                });
            }
            if method.is_empty() {
                return Err(LinkParseError::EmptyMethod {
                    input: input.to_string(),
                });
            }
            if method.contains(METHOD_SEPARATOR) {
                return Err(LinkParseError::TooManySeparators {
                    input: input.to_string(),
                });
            }
            Ok(LinkIdentifier {
                class_name: class,
                method_name: Some(method.to_string()),
            })
        }
    }
}

impl fmt::Display for LinkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", canonical_form(self))
    }
}

impl FromStr for LinkIdentifier {
    type Err = LinkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical_form(s)
    }
}

impl From<LinkIdentifier> for String {
    fn from(id: LinkIdentifier) -> Self {
        canonical_form(&id)
    }
}

impl TryFrom<String> for LinkIdentifier {
    type Error = LinkParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_canonical_form(&value)
    }
}

// ============================================================================
// Declared Links and Test Cases
// ============================================================================

/// A link declared on a test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclaredLink {
    /// The production class or method the test links to.
    pub target: LinkIdentifier,
    /// `true` for links-and-covers declarations, `false` for link-only.
    pub with_coverage: bool,
}

impl DeclaredLink {
    /// A link-only declaration.
    pub fn link_only(target: LinkIdentifier) -> Self {
        DeclaredLink {
            target,
            with_coverage: false,
        }
    }

    /// A links-and-covers declaration.
    pub fn covering(target: LinkIdentifier) -> Self {
        DeclaredLink {
            target,
            with_coverage: true,
        }
    }
}

/// Which declaration grammar a test uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationSyntax {
    /// `test('...')->links(...)` style chained calls.
    FluentChain,
    /// `#[Links(...)]` style metadata attributes on a method.
    AttributeList,
}

impl fmt::Display for DeclarationSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationSyntax::FluentChain => write!(f, "fluent_chain"),
            DeclarationSyntax::AttributeList => write!(f, "attribute_list"),
        }
    }
}

/// One discovered test together with its existing link declarations.
///
/// `span` covers the whole test unit; `declarations_end` is the byte offset
/// where the existing declarations end (or where the first declaration would
/// be inserted when there are none).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTestCase {
    /// Test method name or description.
    pub name: String,
    /// Stable key of the test (`Namespace\Class::name`).
    pub qualified_identifier: String,
    /// Byte span of the whole test unit.
    pub span: Span,
    /// Byte offset of the end of the existing-declarations region.
    pub declarations_end: usize,
    /// Declared links in source order, not deduplicated.
    pub existing_links: Vec<DeclaredLink>,
    /// Grammar used by this test.
    pub syntax: DeclarationSyntax,
}

impl ParsedTestCase {
    /// Prefix the identifier with a namespace (`Namespace\` + identifier).
    ///
    /// An empty namespace leaves the identifier untouched.
    pub fn qualify(mut self, namespace: &str) -> Self {
        let namespace = namespace.trim_matches(NAMESPACE_SEPARATOR);
        if !namespace.is_empty() {
            self.qualified_identifier = format!(
                "{}{}{}",
                namespace, NAMESPACE_SEPARATOR, self.qualified_identifier
            );
        }
        self
    }

    /// True when any declaration targets `target`, regardless of coverage.
    pub fn declares(&self, target: &LinkIdentifier) -> bool {
        self.existing_links.iter().any(|l| &l.target == target)
    }

    /// The container part of the identifier (everything before `::`).
    pub fn container(&self) -> &str {
        split_test_identifier(&self.qualified_identifier).0
    }

    /// The member part of the identifier (everything after `::`).
    pub fn member(&self) -> &str {
        split_test_identifier(&self.qualified_identifier).1
    }
}

/// Split a test identifier into `(container, member)` at the first `::`.
///
/// An identifier without `::` is treated as a bare member.
pub fn split_test_identifier(identifier: &str) -> (&str, &str) {
    match identifier.split_once(METHOD_SEPARATOR) {
        Some((container, member)) => (container, member),
        None => ("", identifier),
    }
}

/// Reduce a test description to an identifier-safe slug.
///
/// ASCII alphanumerics and `_` are kept verbatim; any other run of characters
/// becomes a single `_`; leading and trailing `_` produced this way are
/// dropped. Valid PHP identifiers are returned unchanged.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_gap = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_gap && !out.is_empty() {
                out.push('_');
            }
            pending_gap = false;
            out.push(ch);
        } else {
            pending_gap = true;
        }
    }
    out
}

// ============================================================================
// Link Records
// ============================================================================

/// A parsed test as stored in the registry: the case plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// File the test was parsed from (relative to the project root).
    pub file: PathBuf,
    /// Name of the framework adapter that parsed the file.
    pub framework: String,
    /// The parsed test, with a namespace-qualified identifier.
    pub case: ParsedTestCase,
}

// ============================================================================
// Production Side
// ============================================================================

/// A back-reference from production code to a test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestReference {
    /// Test container (class name, or the file-derived name of a Pest file).
    pub test_identifier: String,
    /// Test method or description; `None` names every test of the container.
    pub test_method: Option<String>,
}

impl TestReference {
    /// Reference a single test.
    pub fn method(test_identifier: impl Into<String>, test_method: impl Into<String>) -> Self {
        TestReference {
            test_identifier: normalize_class(test_identifier.into()),
            test_method: Some(test_method.into()),
        }
    }

    /// Reference every test of a container.
    pub fn container(test_identifier: impl Into<String>) -> Self {
        TestReference {
            test_identifier: normalize_class(test_identifier.into()),
            test_method: None,
        }
    }

    /// Build the reference that points at a registered test identifier.
    pub fn for_test(qualified_identifier: &str) -> Self {
        let (container, member) = split_test_identifier(qualified_identifier);
        TestReference::method(container, member)
    }

    /// The registry key this reference names, if it names a single test.
    pub fn key(&self) -> Option<String> {
        self.test_method
            .as_ref()
            .map(|m| format!("{}{}{}", self.test_identifier, METHOD_SEPARATOR, slug(m)))
    }

    /// True when this reference names the test with `qualified_identifier`.
    pub fn matches(&self, qualified_identifier: &str) -> bool {
        match self.key() {
            Some(key) => key == qualified_identifier,
            None => split_test_identifier(qualified_identifier).0 == self.test_identifier,
        }
    }
}

impl fmt::Display for TestReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test_method {
            Some(method) => write!(f, "{}{}{}", self.test_identifier, METHOD_SEPARATOR, method),
            None => write!(f, "{}", self.test_identifier),
        }
    }
}

/// The inverse relation declared on a production method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionDeclaration {
    /// The method carrying the declarations (method name always present).
    pub owning_method: LinkIdentifier,
    /// Tests named by the method's back-references, in source order.
    pub tests: Vec<TestReference>,
}

/// A production method as seen by the production parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionMethod {
    /// Method name.
    pub name: String,
    /// Byte span of the method declaration.
    pub span: Span,
    /// Back-references declared on the method, in source order.
    pub tested_by: Vec<TestReference>,
}

/// A production class and its methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionClass {
    /// Fully qualified class name.
    pub name: String,
    /// Methods in source order.
    pub methods: Vec<ProductionMethod>,
}

impl ProductionClass {
    /// One declaration per method, including methods without back-references.
    pub fn declarations(&self) -> Vec<ProductionDeclaration> {
        self.methods
            .iter()
            .map(|m| ProductionDeclaration {
                owning_method: LinkIdentifier::method(self.name.clone(), m.name.clone()),
                tests: m.tested_by.clone(),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod canonical {
        use super::*;

        #[test]
        fn method_identifier_renders_with_separator() {
            let id = LinkIdentifier::method("App\\Services\\UserService", "create");
            assert_eq!(id.canonical(), "App\\Services\\UserService::create");
        }

        #[test]
        fn class_identifier_renders_bare() {
            let id = LinkIdentifier::class("App\\Services\\UserService");
            assert_eq!(id.to_string(), "App\\Services\\UserService");
            assert!(id.is_class_level());
        }

        #[test]
        fn parse_drops_leading_backslash() {
            let id = parse_canonical_form("\\App\\Foo::bar").unwrap();
            assert_eq!(id, LinkIdentifier::method("App\\Foo", "bar"));
        }

        #[test]
        fn parse_rejects_empty_parts() {
            assert!(matches!(
                parse_canonical_form("::bar"),
                Err(LinkParseError::EmptyClass { .. })
            ));
            assert!(matches!(
                parse_canonical_form("Foo::"),
                Err(LinkParseError::EmptyMethod { .. })
            ));
            assert!(matches!(
                parse_canonical_form("A::b::c"),
                Err(LinkParseError::TooManySeparators { .. })
            ));
        }

        #[test]
        fn class_level_sorts_before_methods() {
            let mut ids = vec![
                LinkIdentifier::method("B", "a"),
                LinkIdentifier::method("A", "z"),
                LinkIdentifier::class("A"),
                LinkIdentifier::method("A", "b"),
            ];
            ids.sort();
            let rendered: Vec<String> = ids.iter().map(|i| i.canonical()).collect();
            assert_eq!(rendered, vec!["A", "A::b", "A::z", "B::a"]);
        }

        #[test]
        fn serializes_as_canonical_string() {
            let id = LinkIdentifier::method("App\\Foo", "bar");
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"App\\\\Foo::bar\"");
            let back: LinkIdentifier = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }
    }

    mod slugs {
        use super::*;

        #[test]
        fn description_becomes_snake_slug() {
            assert_eq!(slug("it creates a user"), "it_creates_a_user");
        }

        #[test]
        fn identifiers_are_fixed_points() {
            assert_eq!(slug("test_createsUser"), "test_createsUser");
        }

        #[test]
        fn punctuation_runs_collapse() {
            assert_eq!(slug("  handles `null` -> empty!  "), "handles_null_empty");
        }
    }

    mod references {
        use super::*;

        #[test]
        fn method_reference_matches_slugged_identifier() {
            let r = TestReference::method("Tests\\Unit\\UserTest", "it creates a user");
            assert!(r.matches("Tests\\Unit\\UserTest::it_creates_a_user"));
            assert!(!r.matches("Tests\\Unit\\UserTest::it_deletes_a_user"));
        }

        #[test]
        fn container_reference_matches_every_member() {
            let r = TestReference::container("\\Tests\\Unit\\UserTest");
            assert!(r.matches("Tests\\Unit\\UserTest::test_a"));
            assert!(r.matches("Tests\\Unit\\UserTest::test_b"));
            assert!(!r.matches("Tests\\Unit\\OtherTest::test_a"));
        }

        #[test]
        fn for_test_round_trips_registry_key() {
            let r = TestReference::for_test("Tests\\Unit\\UserTest::test_create");
            assert_eq!(r.key().as_deref(), Some("Tests\\Unit\\UserTest::test_create"));
        }
    }

    #[test]
    fn qualify_prefixes_namespace() {
        let case = ParsedTestCase {
            name: "test_create".to_string(),
            qualified_identifier: "UserTest::test_create".to_string(),
            span: Span::new(0, 10),
            declarations_end: 0,
            existing_links: vec![],
            syntax: DeclarationSyntax::AttributeList,
        };
        let q = case.qualify("Tests\\Unit\\");
        assert_eq!(q.qualified_identifier, "Tests\\Unit\\UserTest::test_create");
        assert_eq!(q.container(), "Tests\\Unit\\UserTest");
        assert_eq!(q.member(), "test_create");
    }
}
