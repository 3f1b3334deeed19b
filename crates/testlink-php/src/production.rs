//! Production classes and `#[TestedBy]` back-references.

use std::path::Path;

use testlink_core::link::{LinkIdentifier, ProductionClass, ProductionMethod, TestReference};
use testlink_core::patch::{apply_splices, Span};
use testlink_core::{BackReferenceWriter, ModifyError, ProductionParser, SyntaxError};

use crate::attributes::{AttributeGroup, TESTED_BY};
use crate::edits::insert_declaration_line;
use crate::imports::Imports;
use crate::lexer::tokenize;
use crate::members::{find_classes, ClassDecl};

fn qualified_name(imports: &Imports, class: &ClassDecl) -> String {
    if imports.namespace.is_empty() {
        class.name.clone()
    } else {
        format!("{}\\{}", imports.namespace, class.name)
    }
}

/// Parses production classes with their `#[TestedBy]` declarations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpProductionParser;

impl ProductionParser for PhpProductionParser {
    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "php")
    }

    fn find_classes(&self, source: &str) -> Result<Vec<ProductionClass>, SyntaxError> {
        let lexed = tokenize(source)?;
        let imports = Imports::from_tokens(source, &lexed);
        Ok(find_classes(source, &lexed)
            .into_iter()
            .map(|class| ProductionClass {
                name: qualified_name(&imports, &class),
                methods: class
                    .methods
                    .iter()
                    .map(|m| ProductionMethod {
                        name: m.name.clone(),
                        span: m.span(),
                        tested_by: m
                            .attributes
                            .iter()
                            .flat_map(|g| g.attributes.iter())
                            .filter(|a| a.is(TESTED_BY))
                            .filter_map(|a| a.tested_by(&imports))
                            .collect(),
                    })
                    .collect(),
            })
            .collect())
    }
}

/// Writes `#[TestedBy(...)]` groups above production methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestedByWriter;

impl TestedByWriter {
    /// `#[TestedBy('Tests\Unit\UserServiceTest', 'test_creates_user')]`
    pub fn render(reference: &TestReference) -> String {
        let class = reference.test_identifier.replace('\'', "\\'");
        match &reference.test_method {
            Some(method) => format!(
                "#[{}('{}', '{}')]",
                TESTED_BY,
                class,
                method.replace('\'', "\\'")
            ),
            None => format!("#[{}('{}')]", TESTED_BY, class),
        }
    }
}

fn same_reference(a: &TestReference, b: &TestReference) -> bool {
    a == b || (a.test_identifier == b.test_identifier && a.key().is_some() && a.key() == b.key())
}

impl BackReferenceWriter for TestedByWriter {
    fn inject_back_references(
        &self,
        source: &str,
        method: &LinkIdentifier,
        tests: &[TestReference],
    ) -> Result<String, ModifyError> {
        let not_found = || ModifyError::MethodNotFound {
            method: method.canonical(),
        };
        let method_name = method.method_name.as_deref().ok_or_else(not_found)?;
        let lexed = tokenize(source)?;
        let imports = Imports::from_tokens(source, &lexed);
        let decl = find_classes(source, &lexed)
            .into_iter()
            .filter(|c| qualified_name(&imports, c).eq_ignore_ascii_case(&method.class_name))
            .flat_map(|c| c.methods)
            .find(|m| m.name.eq_ignore_ascii_case(method_name))
            .ok_or_else(not_found)?;

        let tested_by: Vec<&AttributeGroup> =
            decl.attributes.iter().filter(|g| g.has(TESTED_BY)).collect();
        let existing: Vec<TestReference> = tested_by
            .iter()
            .flat_map(|g| g.attributes.iter())
            .filter(|a| a.is(TESTED_BY))
            .filter_map(|a| a.tested_by(&imports))
            .collect();
        let anchors: Vec<Span> = if tested_by.is_empty() {
            decl.attributes.iter().map(|g| g.span).collect()
        } else {
            tested_by.iter().map(|g| g.span).collect()
        };

        let mut added: Vec<&TestReference> = Vec::new();
        let mut splices = Vec::new();
        for reference in tests {
            if existing.iter().any(|e| same_reference(e, reference))
                || added.iter().any(|e| same_reference(e, reference))
            {
                continue;
            }
            splices.push(insert_declaration_line(
                source,
                &anchors,
                decl.keyword_start,
                &Self::render(reference),
            ));
            added.push(reference);
        }
        Ok(apply_splices(source, &splices)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = r#"<?php

namespace App\Services;

use Tests\Unit\UserServiceTest;

class UserService
{
    #[TestedBy(UserServiceTest::class, 'test_creates_user')]
    public function create(array $data): void
    {
    }

    /**
     * Validate input.
     */
    public function validate(array $data): bool
    {
        return true;
    }
}
"#;

    #[test]
    fn parses_classes_methods_and_back_references() {
        let classes = PhpProductionParser.find_classes(SERVICE).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "App\\Services\\UserService");
        let methods: Vec<&str> = classes[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["create", "validate"]);
        assert_eq!(
            classes[0].methods[0].tested_by,
            vec![TestReference::method("Tests\\Unit\\UserServiceTest", "test_creates_user")]
        );
        assert!(classes[0].methods[1].tested_by.is_empty());
    }

    #[test]
    fn injects_after_existing_back_references() {
        let method = LinkIdentifier::method("App\\Services\\UserService", "create");
        let out = TestedByWriter
            .inject_back_references(
                SERVICE,
                &method,
                &[TestReference::method("Tests\\Unit\\UserServiceTest", "test_other")],
            )
            .unwrap();
        assert!(out.contains(
            "    #[TestedBy(UserServiceTest::class, 'test_creates_user')]\n    #[TestedBy('Tests\\Unit\\UserServiceTest', 'test_other')]\n    public function create"
        ));
    }

    #[test]
    fn injects_below_docblock() {
        let method = LinkIdentifier::method("App\\Services\\UserService", "validate");
        let out = TestedByWriter
            .inject_back_references(
                SERVICE,
                &method,
                &[TestReference::method("Tests\\Unit\\UserServiceTest", "test_validates")],
            )
            .unwrap();
        assert!(out.contains(
            "     */\n    #[TestedBy('Tests\\Unit\\UserServiceTest', 'test_validates')]\n    public function validate"
        ));
    }

    #[test]
    fn existing_references_are_skipped() {
        let method = LinkIdentifier::method("App\\Services\\UserService", "create");
        let reference = TestReference::method("Tests\\Unit\\UserServiceTest", "test_creates_user");
        let out = TestedByWriter
            .inject_back_references(SERVICE, &method, &[reference.clone(), reference])
            .unwrap();
        assert_eq!(out, SERVICE);
    }

    #[test]
    fn slugged_test_names_match_display_names() {
        let src = "<?php\nclass S {\n    #[TestedBy('T', 'it creates a user')]\n    public function a() {}\n}\n";
        let out = TestedByWriter
            .inject_back_references(
                src,
                &LinkIdentifier::method("S", "a"),
                &[TestReference::method("T", "it_creates_a_user")],
            )
            .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn missing_method_is_an_error() {
        let method = LinkIdentifier::method("App\\Services\\UserService", "delete");
        assert!(matches!(
            TestedByWriter.inject_back_references(SERVICE, &method, &[]),
            Err(ModifyError::MethodNotFound { .. })
        ));
    }
}
