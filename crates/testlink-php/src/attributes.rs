//! Attribute groups (`#[A(...), B]`) and the link attributes carried in them.

use testlink_core::link::{parse_canonical_form, LinkIdentifier, TestReference};
use testlink_core::patch::Span;

use crate::args::parse_argument;
use crate::imports::Imports;
use crate::lexer::{Argument, Lexed, TokenKind};

/// Test-side link attribute (link only).
pub const LINKS: &str = "Links";
/// Test-side link attribute (link and coverage).
pub const LINKS_AND_COVERS: &str = "LinksAndCovers";
/// Production-side back-reference attribute.
pub const TESTED_BY: &str = "TestedBy";
/// PHPUnit test marker.
pub const TEST: &str = "Test";

/// One attribute inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Name as written, possibly qualified.
    pub name: String,
    pub name_span: Span,
    /// Name through closing parenthesis.
    pub span: Span,
    pub arguments: Vec<Argument>,
}

impl Attribute {
    /// The last segment of the name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('\\').next().unwrap_or(&self.name)
    }

    /// True when the short name is `name`, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.short_name().eq_ignore_ascii_case(name)
    }

    /// True for `Links` and `LinksAndCovers`.
    pub fn is_link(&self) -> bool {
        self.is(LINKS) || self.is(LINKS_AND_COVERS)
    }

    /// Target of a `Links`/`LinksAndCovers` attribute.
    ///
    /// Accepts `(Foo::class)`, `(Foo::class, 'method')`, `('Foo')`,
    /// `('Foo::method')` and `('Foo', 'method')`.
    pub fn link_target(&self, imports: &Imports) -> Option<LinkIdentifier> {
        let (class, method) = self.class_and_method(imports)?;
        match method {
            Some(method) => Some(LinkIdentifier::method(class, method)),
            None => parse_canonical_form(&class).ok(),
        }
    }

    /// Reference carried by a `TestedBy` attribute.
    pub fn tested_by(&self, imports: &Imports) -> Option<TestReference> {
        let (class, method) = self.class_and_method(imports)?;
        if class.is_empty() {
            return None;
        }
        Some(match method {
            Some(method) => TestReference::method(class, method),
            None => match class.split_once("::") {
                Some((class, method)) if !method.is_empty() => {
                    TestReference::method(class, method)
                }
                _ => TestReference::container(class),
            },
        })
    }

    fn class_and_method(&self, imports: &Imports) -> Option<(String, Option<String>)> {
        let mut class = None;
        let mut method = None;
        for (position, argument) in self.arguments.iter().enumerate() {
            let expr = parse_argument(&argument.text).ok()?;
            let is_method = match expr.name.as_deref() {
                Some(label) => label.eq_ignore_ascii_case("method"),
                None => position == 1,
            };
            if is_method {
                method = Some(expr.literal()?);
            } else if class.is_none() {
                let value = if expr.is_class_constant() {
                    expr.resolve(imports)
                } else {
                    expr.literal().or_else(|| Some(expr.resolve(imports)))?
                };
                class = Some(value.trim_start_matches('\\').to_string());
            }
        }
        Some((class?, method.filter(|m| !m.is_empty())))
    }
}

/// One `#[...]` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroup {
    /// `#[` through `]`.
    pub span: Span,
    pub attributes: Vec<Attribute>,
    /// Token index just past the closing `]`.
    pub next: usize,
}

impl AttributeGroup {
    /// Parse the group whose `#[` token is at `open`.
    pub fn parse(source: &str, lexed: &Lexed, open: usize) -> Option<AttributeGroup> {
        let tokens = &lexed.tokens;
        let first = tokens.get(open).filter(|t| t.kind == TokenKind::AttrOpen)?;
        let close = first.partner?;
        let mut attributes = Vec::new();
        let mut i = open + 1;

        while i < close {
            let token = tokens[i];
            if token.kind != TokenKind::Name {
                i += 1;
                continue;
            }
            let mut end = token.span.end;
            let mut arguments = Vec::new();
            let mut next = i + 1;
            if let Some(paren) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::OpenParen) {
                arguments = lexed.arguments(source, i + 1);
                if let Some(p) = paren.partner {
                    end = tokens[p].span.end;
                    next = p + 1;
                }
            }
            attributes.push(Attribute {
                name: token.text(source).to_string(),
                name_span: token.span,
                span: Span::new(token.span.start, end),
                arguments,
            });
            // Skip to the separating comma.
            while next < close && tokens[next].kind != TokenKind::Comma {
                next = tokens[next].partner.filter(|p| *p > next).unwrap_or(next) + 1;
            }
            i = next + 1;
        }

        Some(AttributeGroup {
            span: Span::new(first.span.start, tokens[close].span.end),
            attributes,
            next: close + 1,
        })
    }

    /// True when any attribute is a link attribute.
    pub fn has_link(&self) -> bool {
        self.attributes.iter().any(Attribute::is_link)
    }

    /// True when any attribute has the short name `name`.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.is(name))
    }
}
