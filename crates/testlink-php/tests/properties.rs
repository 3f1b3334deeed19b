//! Property tests for the PHP modifiers and tokenizer.

use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::{select, Index};
use testlink_core::link::parse_canonical_form;
use testlink_core::{LinkIdentifier, SourceModifier, TestParser};
use testlink_php::lexer::tokenize;
use testlink_php::{PestModifier, PestParser, PhpUnitModifier, PhpUnitParser};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_class() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z0-9_]{0,10}(\\\\[A-Z][A-Za-z0-9_]{0,10}){0,3}"
}

fn arb_method() -> impl Strategy<Value = String> {
    "[a-z_][A-Za-z0-9_]{0,12}"
}

fn arb_target() -> impl Strategy<Value = LinkIdentifier> {
    (arb_class(), proptest::option::of(arb_method())).prop_map(|(class, method)| match method {
        Some(m) => LinkIdentifier::method(class, m),
        None => LinkIdentifier::class(class),
    })
}

/// Canonical forms of `targets`, with one of them requested twice.
fn with_repeat(targets: &[LinkIdentifier], repeat: &Index) -> Vec<String> {
    let mut methods: Vec<String> = targets.iter().map(LinkIdentifier::canonical).collect();
    if !targets.is_empty() {
        methods.push(targets[repeat.index(targets.len())].canonical());
    }
    methods
}

fn unique(targets: &[LinkIdentifier]) -> Vec<LinkIdentifier> {
    let mut out: Vec<LinkIdentifier> = Vec::new();
    for target in targets {
        if !out.contains(target) {
            out.push(target.clone());
        }
    }
    out
}

const PEST_SOURCE: &str = "<?php\n\ntest('does a thing', function () {\n    expect(1)->toBe(1);\n});\n";

const PHPUNIT_SOURCE: &str =
    "<?php\n\nfinal class ThingTest\n{\n    #[Test]\n    public function does_a_thing(): void {}\n}\n";

const PEST_LINKED: &str = "<?php\n\ntest('does a thing', function () {\n    expect(1)->toBe(1);\n})->links('Alpha::one', 'Beta::two', 'Gamma');\n";

const PHPUNIT_LINKED: &str = "<?php\n\nfinal class ThingTest\n{\n    #[Test]\n    #[Links('Alpha::one'), Links('Beta::two')]\n    #[Links('Gamma')]\n    public function does_a_thing(): void {}\n}\n";

const LINKED_TARGETS: [&str; 3] = ["Alpha::one", "Beta::two", "Gamma"];

const PEST_SHADOWED: &str =
    "<?php\n\nnamespace Tests\\Unit;\n\nuse App\\Foo;\n\ntest('does a thing', function () {});\n";

const PHPUNIT_SHADOWED: &str = "<?php\n\nnamespace Tests\\Unit;\n\nuse App\\Foo;\n\nfinal class ThingTest\n{\n    public function test_thing(): void {}\n}\n";

// ============================================================================
// Shared Checks
// ============================================================================

/// Inject `methods` into the file's only test, then check the parser sees
/// each distinct target once, a second inject changes nothing, and removing
/// the targets restores the original bytes.
fn inject_then_remove(
    parser: &dyn TestParser,
    modifier: &dyn SourceModifier,
    source: &str,
    methods: &[String],
    coverage: bool,
) -> Result<(), TestCaseError> {
    let case = parser.find_all_tests(source).unwrap().remove(0);
    let injected = modifier.inject_links(source, &case, methods, coverage).unwrap();

    let wanted = unique(
        &methods
            .iter()
            .map(|m| parse_canonical_form(m).unwrap())
            .collect::<Vec<_>>(),
    );
    let reparsed = parser.find_all_tests(&injected).unwrap().remove(0);
    prop_assert_eq!(reparsed.existing_links.len(), wanted.len());
    for target in &wanted {
        prop_assert!(reparsed.existing_links.iter().any(|l| &l.target == target));
    }
    prop_assert!(reparsed.existing_links.iter().all(|l| l.with_coverage == coverage));

    let again = modifier.inject_links(&injected, &reparsed, methods, coverage).unwrap();
    prop_assert_eq!(&again, &injected);

    let removed = modifier.remove_links(&injected, &reparsed, methods).unwrap();
    prop_assert_eq!(removed, source);
    Ok(())
}

/// Inject with coverage into a test whose links are all link-only: picked
/// targets are upgraded in place, the rest stay link-only, extras are added.
fn upgrade_link_only(
    parser: &dyn TestParser,
    modifier: &dyn SourceModifier,
    source: &str,
    picks: [bool; 3],
    extras: &[LinkIdentifier],
    repeat: &Index,
) -> Result<(), TestCaseError> {
    let mut targets: Vec<LinkIdentifier> = LINKED_TARGETS
        .iter()
        .zip(picks)
        .filter(|(_, picked)| *picked)
        .map(|(t, _)| parse_canonical_form(t).unwrap())
        .collect();
    targets.extend(extras.iter().cloned());
    let methods = with_repeat(&targets, repeat);
    let wanted = unique(&targets);

    let case = parser.find_all_tests(source).unwrap().remove(0);
    let injected = modifier.inject_links(source, &case, &methods, true).unwrap();
    let reparsed = parser.find_all_tests(&injected).unwrap().remove(0);

    let mut expected: Vec<LinkIdentifier> = LINKED_TARGETS
        .iter()
        .map(|t| parse_canonical_form(t).unwrap())
        .collect();
    for target in &wanted {
        if !expected.contains(target) {
            expected.push(target.clone());
        }
    }
    prop_assert_eq!(reparsed.existing_links.len(), expected.len());
    for target in &expected {
        let found: Vec<_> = reparsed
            .existing_links
            .iter()
            .filter(|l| &l.target == target)
            .collect();
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(found[0].with_coverage, wanted.contains(target));
    }

    let again = modifier.inject_links(&injected, &reparsed, &methods, true).unwrap();
    prop_assert_eq!(&again, &injected);
    Ok(())
}

// ============================================================================
// Inject / Remove
// ============================================================================

proptest! {
    /// Repeated requests collapse to one declaration per target.
    #[test]
    fn pest_inject_then_remove_restores_source(
        targets in vec(arb_target(), 1..4),
        repeat in any::<Index>(),
        coverage in any::<bool>(),
    ) {
        let methods = with_repeat(&targets, &repeat);
        inject_then_remove(&PestParser, &PestModifier, PEST_SOURCE, &methods, coverage)?;
    }

    #[test]
    fn phpunit_inject_then_remove_restores_source(
        targets in vec(arb_target(), 1..4),
        repeat in any::<Index>(),
        coverage in any::<bool>(),
    ) {
        let methods = with_repeat(&targets, &repeat);
        inject_then_remove(&PhpUnitParser, &PhpUnitModifier, PHPUNIT_SOURCE, &methods, coverage)?;
    }

    #[test]
    fn pest_coverage_upgrades_existing_links(
        picks in any::<[bool; 3]>(),
        extras in vec(arb_target(), 0..3),
        repeat in any::<Index>(),
    ) {
        upgrade_link_only(&PestParser, &PestModifier, PEST_LINKED, picks, &extras, &repeat)?;
    }

    #[test]
    fn phpunit_coverage_upgrades_existing_links(
        picks in any::<[bool; 3]>(),
        extras in vec(arb_target(), 0..3),
        repeat in any::<Index>(),
    ) {
        upgrade_link_only(&PhpUnitParser, &PhpUnitModifier, PHPUNIT_LINKED, picks, &extras, &repeat)?;
    }

    /// Targets whose short name collides with an import still round-trip.
    #[test]
    fn injected_targets_survive_import_shadowing(
        class in select(vec!["Tests\\Unit\\Foo", "App\\Foo", "Tests\\Unit\\Bar"]),
        method in arb_method(),
        coverage in any::<bool>(),
    ) {
        let methods = vec![LinkIdentifier::method(class, method).canonical()];
        inject_then_remove(&PestParser, &PestModifier, PEST_SHADOWED, &methods, coverage)?;
        inject_then_remove(&PhpUnitParser, &PhpUnitModifier, PHPUNIT_SHADOWED, &methods, coverage)?;
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

proptest! {
    /// Arbitrary input never panics; token spans are ordered and in bounds.
    #[test]
    fn tokenizer_spans_are_ordered(source in "\\PC{0,80}") {
        if let Ok(lexed) = tokenize(&source) {
            let mut previous = 0;
            for token in &lexed.tokens {
                prop_assert!(token.span.start >= previous);
                prop_assert!(token.span.end <= source.len());
                previous = token.span.end;
            }
        }
    }
}
