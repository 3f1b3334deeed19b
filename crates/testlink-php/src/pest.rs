//! Pest: fluent-chain link declarations.
//!
//! A Pest test is a top-level `test(...)` or `it(...)` call, optionally
//! nested in `describe(...)` blocks, with links declared as chained calls:
//!
//! ```php
//! test('it creates a user', function () { ... })
//!     ->linksAndCovers(UserService::class.'::create')
//!     ->links('App\Services\Mailer::send');
//! ```
//!
//! Test identifiers are the slugged title path (`users__it_creates_a_user`),
//! prefixed with the slugged file stem once a file is parsed from disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use testlink_core::adapter::{relocate, TestParser, GROUP_SEPARATOR};
use testlink_core::link::{
    parse_canonical_form, slug, DeclarationSyntax, DeclaredLink, LinkIdentifier, ParsedTestCase,
    METHOD_SEPARATOR,
};
use testlink_core::patch::{apply_splices, Span, Splice};
use testlink_core::{LinkError, ModifyError, SourceModifier, SyntaxError};
use tracing::trace;

use crate::args::parse_argument;
use crate::edits::remove_list_items;
use crate::imports::Imports;
use crate::lexer::{tokenize, Argument, Lexed, TokenKind};

/// Chained call declaring a link only.
pub const LINKS_CALL: &str = "links";
/// Chained call declaring a link with coverage.
pub const LINKS_AND_COVERS_CALL: &str = "linksAndCovers";

const SEGMENT_SEPARATOR: &str = "__";

/// One `->name(...)` call of a test's chain.
#[derive(Debug, Clone)]
struct ChainCall {
    name: String,
    name_span: Span,
    /// Index of the `->` token.
    arrow: usize,
    /// End of the closing parenthesis.
    end: usize,
    arguments: Vec<Argument>,
    /// Resolved target per argument (`None` when unsupported).
    targets: Vec<Option<LinkIdentifier>>,
}

impl ChainCall {
    fn is_link(&self) -> bool {
        self.name == LINKS_CALL || self.name == LINKS_AND_COVERS_CALL
    }

    fn with_coverage(&self) -> bool {
        self.name == LINKS_AND_COVERS_CALL
    }
}

#[derive(Debug, Clone)]
struct PestTest {
    case: ParsedTestCase,
    chain: Vec<ChainCall>,
}

/// A parsed Pest file.
struct PestFile {
    lexed: Lexed,
    imports: Imports,
    tests: Vec<PestTest>,
}

fn parse_pest(source: &str) -> Result<PestFile, SyntaxError> {
    let lexed = tokenize(source)?;
    let imports = Imports::from_tokens(source, &lexed);
    let tokens = &lexed.tokens;
    let mut tests = Vec::new();
    // (title, index of the closing parenthesis of the describe call)
    let mut groups: Vec<(String, usize)> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        while groups.last().is_some_and(|(_, close)| *close < i) {
            groups.pop();
        }
        let token = tokens[i];
        let keyword = ["test", "it", "describe"]
            .into_iter()
            .find(|k| token.is_keyword(source, k));
        let previous = i.checked_sub(1).map(|p| tokens[p]);
        let is_call = previous.is_none_or(|p| {
            p.kind != TokenKind::Arrow
                && p.kind != TokenKind::DoubleColon
                && !p.is_keyword(source, "function")
                && !p.is_keyword(source, "new")
        });
        let open = tokens.get(i + 1).filter(|t| t.kind == TokenKind::OpenParen);
        let (Some(keyword), true, Some(open)) = (keyword, is_call, open) else {
            i += 1;
            continue;
        };
        let Some(close) = open.partner else {
            i += 1;
            continue;
        };

        let arguments = lexed.arguments(source, i + 1);
        let title = arguments
            .first()
            .map(|a| {
                parse_argument(&a.text)
                    .ok()
                    .and_then(|e| e.literal())
                    .unwrap_or_else(|| a.text.clone())
            })
            .unwrap_or_default();

        if keyword == "describe" {
            groups.push((title, close));
            i += 2;
            continue;
        }

        let leaf = if keyword == "it" {
            format!("it {title}")
        } else {
            title
        };
        let mut segments: Vec<String> = groups.iter().map(|(t, _)| t.clone()).collect();
        segments.push(leaf);

        let chain = parse_chain(source, &lexed, &imports, close + 1);
        let call_end = tokens[close].span.end;
        let end = chain.last().map(|c| c.end).unwrap_or(call_end);
        let links: Vec<&ChainCall> = chain.iter().filter(|c| c.is_link()).collect();
        let declarations_end = links.last().map(|c| c.end).unwrap_or(call_end);

        let mut existing_links = Vec::new();
        for call in &links {
            for target in call.targets.iter().flatten() {
                existing_links.push(DeclaredLink {
                    target: target.clone(),
                    with_coverage: call.with_coverage(),
                });
            }
        }

        let case = ParsedTestCase {
            name: segments.join(GROUP_SEPARATOR),
            qualified_identifier: segments
                .iter()
                .map(|s| slug(s))
                .collect::<Vec<_>>()
                .join(SEGMENT_SEPARATOR),
            span: Span::new(token.span.start, end),
            declarations_end,
            existing_links,
            syntax: DeclarationSyntax::FluentChain,
        };
        trace!(test = %case.name, links = case.existing_links.len(), "pest test");
        tests.push(PestTest { case, chain });
        i += 2;
    }

    Ok(PestFile {
        lexed,
        imports,
        tests,
    })
}

fn parse_chain(source: &str, lexed: &Lexed, imports: &Imports, mut i: usize) -> Vec<ChainCall> {
    let tokens = &lexed.tokens;
    let mut chain = Vec::new();
    loop {
        let arrow = tokens.get(i).filter(|t| t.kind == TokenKind::Arrow);
        let name = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Name);
        let open = tokens.get(i + 2).filter(|t| t.kind == TokenKind::OpenParen);
        let (Some(_), Some(name), Some(open)) = (arrow, name, open) else {
            break;
        };
        let Some(close) = open.partner else {
            break;
        };
        let arguments = lexed.arguments(source, i + 2);
        let targets = arguments
            .iter()
            .map(|a| {
                let expr = parse_argument(&a.text).ok()?;
                parse_canonical_form(&expr.resolve(imports)).ok()
            })
            .collect();
        chain.push(ChainCall {
            name: name.text(source).to_string(),
            name_span: name.span,
            arrow: i,
            end: tokens[close].span.end,
            arguments,
            targets,
        });
        i = close + 1;
    }
    chain
}

/// Container identifier for tests in `path`: the slugged file name without
/// its `.php` extension.
pub fn file_container(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    slug(name.strip_suffix(".php").unwrap_or(&name))
}

// ============================================================================
// Parser
// ============================================================================

/// Parses Pest test files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PestParser;

impl TestParser for PestParser {
    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "php")
    }

    fn find_all_tests(&self, source: &str) -> Result<Vec<ParsedTestCase>, SyntaxError> {
        Ok(parse_pest(source)?
            .tests
            .into_iter()
            .map(|t| t.case)
            .collect())
    }

    fn parse_file(&self, path: &Path) -> Result<Vec<ParsedTestCase>, LinkError> {
        let source = fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
        let cases = self
            .find_all_tests(&source)
            .map_err(|e| LinkError::parse(path, e.to_string()))?;
        let container = file_container(path);
        Ok(cases
            .into_iter()
            .map(|mut case| {
                case.qualified_identifier =
                    format!("{}{}{}", container, METHOD_SEPARATOR, case.qualified_identifier);
                case
            })
            .collect())
    }
}

// ============================================================================
// Modifier
// ============================================================================

/// Rewrites Pest link chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct PestModifier;

impl PestModifier {
    fn locate(source: &str, case: &ParsedTestCase) -> Result<(PestFile, usize), ModifyError> {
        let file = parse_pest(source)?;
        let cases = file.tests.iter().map(|t| t.case.clone()).collect();
        let found = relocate(cases, case).ok_or_else(|| ModifyError::TestNotFound {
            name: case.name.clone(),
        })?;
        let index = file
            .tests
            .iter()
            .position(|t| t.case.span == found.span)
            .ok_or_else(|| ModifyError::TestNotFound {
                name: case.name.clone(),
            })?;
        Ok((file, index))
    }

    /// Whitespace to put before a new `->` call.
    fn chain_separator<'s>(source: &'s str, file: &PestFile, test: &PestTest) -> &'s str {
        let anchor = test
            .chain
            .iter()
            .rev()
            .find(|c| c.is_link())
            .or(test.chain.first());
        let Some(call) = anchor else {
            return "";
        };
        let arrow = call.arrow;
        let before = file.lexed.tokens[arrow - 1].span.end;
        let gap = &source[before..file.lexed.tokens[arrow].span.start];
        if gap.chars().all(char::is_whitespace) {
            gap
        } else {
            ""
        }
    }

    fn render_call(imports: &Imports, target: &LinkIdentifier, with_coverage: bool) -> String {
        let name = if with_coverage {
            LINKS_AND_COVERS_CALL
        } else {
            LINKS_CALL
        };
        let argument = match imports.alias_for(&target.class_name) {
            Some(alias) => match &target.method_name {
                Some(method) => format!("{alias}::class.'{METHOD_SEPARATOR}{method}'"),
                None => format!("{alias}::class"),
            },
            None => format!("'{}'", target.canonical().replace('\'', "\\'")),
        };
        format!("->{name}({argument})")
    }
}

impl SourceModifier for PestModifier {
    fn supports(&self, case: &ParsedTestCase) -> bool {
        case.syntax == DeclarationSyntax::FluentChain
    }

    fn inject_links(
        &self,
        source: &str,
        case: &ParsedTestCase,
        methods: &[String],
        with_coverage: bool,
    ) -> Result<String, ModifyError> {
        let (file, index) = Self::locate(source, case)?;
        let test = &file.tests[index];
        let separator = Self::chain_separator(source, &file, test);

        let mut wanted: Vec<LinkIdentifier> = Vec::new();
        for method in methods {
            let target = parse_canonical_form(method)?;
            if !wanted.contains(&target) {
                wanted.push(target);
            }
        }

        // Per link call, the arguments moving to a coverage declaration.
        let mut upgrades: BTreeMap<usize, Vec<bool>> = BTreeMap::new();
        let mut pending: Vec<(LinkIdentifier, Vec<usize>)> = Vec::new();
        for target in wanted {
            let existing: Vec<(usize, usize)> = test
                .chain
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_link())
                .flat_map(|(ci, c)| {
                    c.targets
                        .iter()
                        .enumerate()
                        .filter(|(_, t)| t.as_ref() == Some(&target))
                        .map(move |(arg, _)| (ci, arg))
                })
                .collect();

            if existing.is_empty() {
                pending.push((target, Vec::new()));
                continue;
            }
            if !with_coverage || existing.iter().any(|(ci, _)| test.chain[*ci].with_coverage()) {
                continue;
            }
            for (ci, arg) in &existing {
                upgrades
                    .entry(*ci)
                    .or_insert_with(|| vec![false; test.chain[*ci].arguments.len()])[*arg] = true;
            }
            let mut calls: Vec<usize> = existing.iter().map(|(ci, _)| *ci).collect();
            calls.dedup();
            pending.push((target, calls));
        }

        let renamed = |ci: &usize| upgrades.get(ci).is_some_and(|f| f.iter().all(|f| *f));
        let mut splices = Vec::new();
        for (ci, flags) in &upgrades {
            let call = &test.chain[*ci];
            if renamed(ci) {
                splices.push(Splice::replace(call.name_span, LINKS_AND_COVERS_CALL));
            } else {
                let spans: Vec<Span> = call.arguments.iter().map(|a| a.span).collect();
                splices.extend(remove_list_items(&spans, flags));
            }
        }

        let mut appended = String::new();
        for (target, calls) in &pending {
            if calls.iter().any(renamed) {
                continue;
            }
            appended.push_str(separator);
            appended.push_str(&Self::render_call(
                &file.imports,
                target,
                with_coverage || !calls.is_empty(),
            ));
        }
        if !appended.is_empty() {
            splices.push(Splice::insert(test.case.declarations_end, appended));
        }
        Ok(apply_splices(source, &splices)?)
    }

    fn remove_links(
        &self,
        source: &str,
        case: &ParsedTestCase,
        methods: &[String],
    ) -> Result<String, ModifyError> {
        let (file, index) = Self::locate(source, case)?;
        let test = &file.tests[index];
        let targets = methods
            .iter()
            .map(|m| parse_canonical_form(m))
            .collect::<Result<Vec<_>, _>>()?;

        let mut splices = Vec::new();
        for call in test.chain.iter().filter(|c| c.is_link()) {
            let flags: Vec<bool> = call
                .targets
                .iter()
                .map(|t| t.as_ref().is_some_and(|t| targets.contains(t)))
                .collect();
            if !flags.iter().any(|f| *f) {
                continue;
            }
            if flags.iter().all(|f| *f) {
                let start = file.lexed.tokens[call.arrow - 1].span.end;
                splices.push(Splice::delete(Span::new(start, call.end)));
            } else {
                let spans: Vec<Span> = call.arguments.iter().map(|a| a.span).collect();
                splices.extend(remove_list_items(&spans, &flags));
            }
        }
        Ok(apply_splices(source, &splices)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tests_of(source: &str) -> Vec<ParsedTestCase> {
        PestParser.find_all_tests(source).unwrap()
    }

    fn targets(case: &ParsedTestCase) -> Vec<(String, bool)> {
        case.existing_links
            .iter()
            .map(|l| (l.target.canonical(), l.with_coverage))
            .collect()
    }

    const BASIC: &str = r#"<?php

use App\Services\UserService;

test('it creates a user', function () {
    expect(true)->toBeTrue();
})->linksAndCovers(UserService::class.'::create');
"#;

    mod parsing {
        use super::*;

        #[test]
        fn single_covering_link() {
            let cases = tests_of(BASIC);
            assert_eq!(cases.len(), 1);
            let case = &cases[0];
            assert_eq!(case.name, "it creates a user");
            assert_eq!(case.qualified_identifier, "it_creates_a_user");
            assert_eq!(
                targets(case),
                vec![("App\\Services\\UserService::create".to_string(), true)]
            );
            assert!(BASIC[..case.declarations_end].ends_with("'::create')"));
        }

        #[test]
        fn chained_links_in_order() {
            let src = "<?php\ntest('x')\n    ->links('A::one', 'A::two')\n    ->group('g')\n    ->linksAndCovers('B');\n";
            let cases = tests_of(src);
            assert_eq!(
                targets(&cases[0]),
                vec![
                    ("A::one".to_string(), false),
                    ("A::two".to_string(), false),
                    ("B".to_string(), true),
                ]
            );
            assert!(src[..cases[0].declarations_end].ends_with("->linksAndCovers('B')"));
        }

        #[test]
        fn nested_describe_and_it() {
            let src = r#"<?php
describe('users', function () {
    describe('creation', function () {
        it('works', function () {})->links('A::b');
    });
    test('other', function () {});
});
test('top', function () {});
"#;
            let names: Vec<(String, String)> = tests_of(src)
                .into_iter()
                .map(|c| (c.name, c.qualified_identifier))
                .collect();
            assert_eq!(
                names,
                vec![
                    (
                        "users > creation > it works".to_string(),
                        "users__creation__it_works".to_string()
                    ),
                    ("users > other".to_string(), "users__other".to_string()),
                    ("top".to_string(), "top".to_string()),
                ]
            );
        }

        #[test]
        fn method_calls_named_test_are_ignored() {
            let src = "<?php\n$this->test('x');\nFoo::it('y');\nfunction test() {}\n";
            assert!(tests_of(src).is_empty());
        }

        #[test]
        fn unsupported_link_arguments_are_skipped() {
            let src = "<?php\ntest('x')->links($dynamic, 'A::b');\n";
            assert_eq!(targets(&tests_of(src)[0]), vec![("A::b".to_string(), false)]);
        }

        #[test]
        fn parse_file_prefixes_the_file_stem() {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("UserServiceTest.php");
            fs::write(&path, BASIC).unwrap();
            let cases = PestParser.parse_file(&path).unwrap();
            assert_eq!(cases[0].qualified_identifier, "UserServiceTest::it_creates_a_user");
            assert_eq!(file_container(Path::new("tests/user.test.php")), "user_test");
        }

        #[test]
        fn malformed_file_is_a_syntax_error() {
            assert!(PestParser.find_all_tests("<?php\ntest('x', function () {\n").is_err());
        }
    }

    mod modifying {
        use super::*;

        fn case(source: &str, index: usize) -> ParsedTestCase {
            tests_of(source).remove(index)
        }

        #[test]
        fn inject_appends_inline() {
            let src = "<?php\ntest('x', function () {});\n";
            let out = PestModifier
                .inject_links(src, &case(src, 0), &["App\\Foo::bar".to_string()], true)
                .unwrap();
            assert_eq!(
                out,
                "<?php\ntest('x', function () {})->linksAndCovers('App\\Foo::bar');\n"
            );
        }

        #[test]
        fn inject_follows_existing_chain_layout_and_imports() {
            let src = "<?php\nuse App\\Foo;\ntest('x')\n    ->links('A::b');\n";
            let out = PestModifier
                .inject_links(src, &case(src, 0), &["App\\Foo::bar".to_string()], false)
                .unwrap();
            assert_eq!(
                out,
                "<?php\nuse App\\Foo;\ntest('x')\n    ->links('A::b')\n    ->links(Foo::class.'::bar');\n"
            );
        }

        #[test]
        fn inject_is_idempotent() {
            let src = BASIC;
            let methods = vec!["App\\Services\\UserService::create".to_string()];
            let out = PestModifier
                .inject_links(src, &case(src, 0), &methods, true)
                .unwrap();
            assert_eq!(out, src);
        }

        #[test]
        fn inject_upgrades_link_only_declaration() {
            let src = "<?php\ntest('x')->links('A::b');\n";
            let out = PestModifier
                .inject_links(src, &case(src, 0), &["A::b".to_string()], true)
                .unwrap();
            assert_eq!(out, "<?php\ntest('x')->linksAndCovers('A::b');\n");

            let src = "<?php\ntest('x')->links('A::b', 'A::c');\n";
            let out = PestModifier
                .inject_links(src, &case(src, 0), &["A::c".to_string()], true)
                .unwrap();
            assert_eq!(out, "<?php\ntest('x')->links('A::b')->linksAndCovers('A::c');\n");
        }

        #[test]
        fn inject_collapses_repeated_methods() {
            let src = "<?php\ntest('x', function () {});\n";
            let methods = vec!["A::b".to_string(), "A::b".to_string()];
            let out = PestModifier
                .inject_links(src, &case(src, 0), &methods, false)
                .unwrap();
            assert_eq!(out, "<?php\ntest('x', function () {})->links('A::b');\n");
            assert_eq!(case(&out, 0).existing_links.len(), 1);
        }

        #[test]
        fn inject_upgrades_every_argument_of_one_call() {
            let src = "<?php\ntest('x')->links('A::b', 'A::c');\n";
            let methods = vec!["A::b".to_string(), "A::c".to_string()];
            let out = PestModifier
                .inject_links(src, &case(src, 0), &methods, true)
                .unwrap();
            assert_eq!(out, "<?php\ntest('x')->linksAndCovers('A::b', 'A::c');\n");
        }

        #[test]
        fn inject_upgrades_some_arguments_of_one_call() {
            let src = "<?php\ntest('x')->links('A::b', 'A::c', 'A::d');\n";
            let methods = vec!["A::b".to_string(), "A::c".to_string(), "A::b".to_string()];
            let out = PestModifier
                .inject_links(src, &case(src, 0), &methods, true)
                .unwrap();
            assert_eq!(
                out,
                "<?php\ntest('x')->links('A::d')->linksAndCovers('A::b')->linksAndCovers('A::c');\n"
            );
            let again = PestModifier
                .inject_links(&out, &case(&out, 0), &methods, true)
                .unwrap();
            assert_eq!(again, out);
        }

        #[test]
        fn remove_whole_call_and_single_argument() {
            let src = "<?php\ntest('x')\n    ->links('A::b')\n    ->linksAndCovers('C::d', 'E::f');\n";
            let out = PestModifier
                .remove_links(src, &case(src, 0), &["A::b".to_string(), "E::f".to_string()])
                .unwrap();
            assert_eq!(out, "<?php\ntest('x')\n    ->linksAndCovers('C::d');\n");
        }

        #[test]
        fn remove_then_inject_restores_source() {
            let src = "<?php\ntest('x', function () {})->links('A::b');\n";
            let removed = PestModifier
                .remove_links(src, &case(src, 0), &["A::b".to_string()])
                .unwrap();
            assert_eq!(removed, "<?php\ntest('x', function () {});\n");
            let restored = PestModifier
                .inject_links(&removed, &case(&removed, 0), &["A::b".to_string()], false)
                .unwrap();
            assert_eq!(restored, src);
        }

        #[test]
        fn remove_without_match_is_byte_identical() {
            let src = "<?php\ntest('x')->links('A::b');\n";
            let out = PestModifier
                .remove_links(src, &case(src, 0), &["Z::z".to_string()])
                .unwrap();
            assert_eq!(out, src);
        }

        #[test]
        fn stale_span_is_relocated() {
            let src = "<?php\ntest('a');\ntest('b');\n";
            let mut second = case(src, 1);
            second.qualified_identifier = "Tests\\ATest::b".to_string();
            let edited = format!("<?php\n// moved\n{}", &src[6..]);
            let out = PestModifier
                .inject_links(&edited, &second, &["A::b".to_string()], false)
                .unwrap();
            assert!(out.ends_with("test('b')->links('A::b');\n"));
        }

        #[test]
        fn missing_test_is_reported() {
            let src = "<?php\ntest('a');\n";
            let mut missing = case(src, 0);
            missing.name = "gone".to_string();
            assert!(matches!(
                PestModifier.inject_links(src, &missing, &["A::b".to_string()], false),
                Err(ModifyError::TestNotFound { .. })
            ));
        }
    }
}
