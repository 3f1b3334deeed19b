//! PHPUnit: attribute-list link declarations.
//!
//! Test methods are methods named `test*`, or marked `#[Test]` or `@test`.
//! Links are attribute groups stacked above the method:
//!
//! ```php
//! #[LinksAndCovers(UserService::class, 'create')]
//! #[Links(UserService::class, 'validate')]
//! public function test_creates_user(): void
//! ```

use std::path::Path;

use testlink_core::adapter::{relocate, TestParser};
use testlink_core::link::{
    parse_canonical_form, DeclarationSyntax, DeclaredLink, LinkIdentifier, ParsedTestCase,
    METHOD_SEPARATOR,
};
use testlink_core::patch::{apply_splices, Span, Splice};
use testlink_core::text::line_start;
use testlink_core::{ModifyError, SourceModifier, SyntaxError};

use crate::attributes::{Attribute, AttributeGroup, LINKS, LINKS_AND_COVERS, TEST};
use crate::edits::{insert_declaration_line, remove_construct, remove_list_items};
use crate::imports::Imports;
use crate::lexer::tokenize;
use crate::members::{find_classes, MethodDecl};

struct TestMethod {
    case: ParsedTestCase,
    method: MethodDecl,
}

struct PhpUnitFile {
    imports: Imports,
    tests: Vec<TestMethod>,
}

/// PHPUnit runs public, concrete methods named `test*` or marked as tests.
fn is_test_method(source: &str, method: &MethodDecl) -> bool {
    if !method.is_public() || method.is_abstract() {
        return false;
    }
    method.name.starts_with("test")
        || method.attributes.iter().any(|g| g.has(TEST))
        || method
            .doc_comment
            .is_some_and(|d| d.slice(source).contains("@test"))
}

fn link_groups(method: &MethodDecl) -> impl Iterator<Item = &AttributeGroup> {
    method.attributes.iter().filter(|g| g.has_link())
}

fn parse_phpunit(source: &str) -> Result<PhpUnitFile, SyntaxError> {
    let lexed = tokenize(source)?;
    let imports = Imports::from_tokens(source, &lexed);
    let mut tests = Vec::new();

    for class in find_classes(source, &lexed) {
        for method in class.methods {
            if !is_test_method(source, &method) {
                continue;
            }
            let mut existing_links = Vec::new();
            for group in link_groups(&method) {
                for attribute in group.attributes.iter().filter(|a| a.is_link()) {
                    if let Some(target) = attribute.link_target(&imports) {
                        existing_links.push(DeclaredLink {
                            target,
                            with_coverage: attribute.is(LINKS_AND_COVERS),
                        });
                    }
                }
            }
            let declarations_end = link_groups(&method)
                .last()
                .map(|g| g.span.end)
                .unwrap_or_else(|| line_start(source, method.start));
            let case = ParsedTestCase {
                name: method.name.clone(),
                qualified_identifier: format!("{}{}{}", class.name, METHOD_SEPARATOR, method.name),
                span: method.span(),
                declarations_end,
                existing_links,
                syntax: DeclarationSyntax::AttributeList,
            };
            tests.push(TestMethod { case, method });
        }
    }
    Ok(PhpUnitFile { imports, tests })
}

// ============================================================================
// Parser
// ============================================================================

/// Parses PHPUnit test classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpUnitParser;

impl TestParser for PhpUnitParser {
    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "php")
    }

    fn find_all_tests(&self, source: &str) -> Result<Vec<ParsedTestCase>, SyntaxError> {
        Ok(parse_phpunit(source)?
            .tests
            .into_iter()
            .map(|t| t.case)
            .collect())
    }
}

// ============================================================================
// Modifier
// ============================================================================

/// Rewrites PHPUnit link attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpUnitModifier;

impl PhpUnitModifier {
    fn locate(source: &str, case: &ParsedTestCase) -> Result<(PhpUnitFile, usize), ModifyError> {
        let file = parse_phpunit(source)?;
        let not_found = || ModifyError::TestNotFound {
            name: case.name.clone(),
        };
        let cases = file.tests.iter().map(|t| t.case.clone()).collect();
        let found = relocate(cases, case).ok_or_else(not_found)?;
        let index = file
            .tests
            .iter()
            .position(|t| t.case.span == found.span)
            .ok_or_else(not_found)?;
        Ok((file, index))
    }

    /// `#[LinksAndCovers(UserService::class, 'create')]`
    fn render_group(imports: &Imports, target: &LinkIdentifier, with_coverage: bool) -> String {
        let name = if with_coverage { LINKS_AND_COVERS } else { LINKS };
        let class = imports.reference_to(&target.class_name);
        match &target.method_name {
            Some(method) => format!("#[{name}({class}::class, '{}')]", method.replace('\'', "\\'")),
            None => format!("#[{name}({class}::class)]"),
        }
    }

    /// Splice renaming `Links` to `LinksAndCovers`, keeping any qualifier.
    fn upgrade(attribute: &Attribute) -> Splice {
        let short = attribute.short_name().len();
        let span = Span::new(attribute.name_span.end - short, attribute.name_span.end);
        Splice::replace(span, LINKS_AND_COVERS)
    }
}

impl SourceModifier for PhpUnitModifier {
    fn supports(&self, case: &ParsedTestCase) -> bool {
        case.syntax == DeclarationSyntax::AttributeList
    }

    fn inject_links(
        &self,
        source: &str,
        case: &ParsedTestCase,
        methods: &[String],
        with_coverage: bool,
    ) -> Result<String, ModifyError> {
        let (file, index) = Self::locate(source, case)?;
        let method = &file.tests[index].method;
        let anchors: Vec<Span> = if link_groups(method).next().is_some() {
            link_groups(method).map(|g| g.span).collect()
        } else {
            method.attributes.iter().map(|g| g.span).collect()
        };

        let mut splices = Vec::new();
        let mut seen: Vec<LinkIdentifier> = Vec::new();
        for canonical in methods {
            let target = parse_canonical_form(canonical)?;
            if seen.contains(&target) {
                continue;
            }
            seen.push(target.clone());
            let existing: Vec<&Attribute> = link_groups(method)
                .flat_map(|g| g.attributes.iter())
                .filter(|a| a.is_link() && a.link_target(&file.imports).as_ref() == Some(&target))
                .collect();

            if existing.is_empty() {
                let text = Self::render_group(&file.imports, &target, with_coverage);
                splices.push(insert_declaration_line(
                    source,
                    &anchors,
                    method.keyword_start,
                    &text,
                ));
            } else if with_coverage && !existing.iter().any(|a| a.is(LINKS_AND_COVERS)) {
                splices.push(Self::upgrade(existing[0]));
            }
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
        let method = &file.tests[index].method;
        let targets = methods
            .iter()
            .map(|m| parse_canonical_form(m))
            .collect::<Result<Vec<_>, _>>()?;

        let mut splices = Vec::new();
        for group in link_groups(method) {
            let flags: Vec<bool> = group
                .attributes
                .iter()
                .map(|a| {
                    a.is_link()
                        && a.link_target(&file.imports)
                            .is_some_and(|t| targets.contains(&t))
                })
                .collect();
            if !flags.iter().any(|f| *f) {
                continue;
            }
            if flags.iter().all(|f| *f) {
                splices.push(remove_construct(source, group.span));
            } else {
                let spans: Vec<Span> = group.attributes.iter().map(|a| a.span).collect();
                splices.extend(remove_list_items(&spans, &flags));
            }
        }
        Ok(apply_splices(source, &splices)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
