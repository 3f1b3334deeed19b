//! Class and method declarations.
//!
//! A shallow structural walk over the token stream: classes (`class`,
//! `trait`, `enum`) and the methods in their bodies, with each method's
//! attribute groups and doc comment. Method bodies are skipped whole via
//! bracket partners, so closures and anonymous classes inside them are never
//! mistaken for members.

use testlink_core::patch::Span;

use crate::attributes::AttributeGroup;
use crate::lexer::{Lexed, TokenKind};

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "readonly",
];

/// A class-like declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    /// Short name, as declared.
    pub name: String,
    /// Keyword through closing brace.
    pub span: Span,
    pub methods: Vec<MethodDecl>,
}

/// A method declaration inside a class body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub name_span: Span,
    /// First attribute group, modifier or `function` keyword.
    pub start: usize,
    /// First modifier or `function` keyword, after any attributes.
    pub keyword_start: usize,
    /// End of the body (or of the `;` of an abstract method).
    pub end: usize,
    pub attributes: Vec<AttributeGroup>,
    pub doc_comment: Option<Span>,
    /// Modifier keywords, lowercased, in source order.
    pub modifiers: Vec<String>,
}

impl MethodDecl {
    /// Full declaration span.
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// True when declared without `private`/`protected` (PHP defaults to public).
    pub fn is_public(&self) -> bool {
        !self
            .modifiers
            .iter()
            .any(|m| m == "private" || m == "protected")
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.iter().any(|m| m == "abstract")
    }
}

/// Find every class-like declaration in the file.
pub fn find_classes(source: &str, lexed: &Lexed) -> Vec<ClassDecl> {
    let tokens = &lexed.tokens;
    let mut classes = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let is_class_keyword = token.is_keyword(source, "class")
            || token.is_keyword(source, "trait")
            || token.is_keyword(source, "enum");
        let previous = i.checked_sub(1).map(|p| tokens[p]);
        let excluded = previous.is_some_and(|p| {
            p.kind == TokenKind::DoubleColon
                || p.kind == TokenKind::Arrow
                || p.is_keyword(source, "new")
                || p.is_keyword(source, "function")
                || p.is_keyword(source, "const")
        });
        if !is_class_keyword || excluded {
            i += 1;
            continue;
        }
        let Some(name) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Name) else {
            i += 1;
            continue;
        };
        let Some(open) = (i + 2..tokens.len()).find(|j| {
            matches!(
                tokens[*j].kind,
                TokenKind::OpenBrace | TokenKind::Semicolon | TokenKind::OpenParen
            )
        }) else {
            break;
        };
        let Some(close) = tokens[open].partner.filter(|_| tokens[open].kind == TokenKind::OpenBrace)
        else {
            i = open + 1;
            continue;
        };
        classes.push(ClassDecl {
            name: name.text(source).to_string(),
            span: Span::new(token.span.start, tokens[close].span.end),
            methods: find_methods(source, lexed, open, close),
        });
        i = close + 1;
    }
    classes
}

fn find_methods(source: &str, lexed: &Lexed, open: usize, close: usize) -> Vec<MethodDecl> {
    let tokens = &lexed.tokens;
    let mut methods = Vec::new();
    let mut attributes: Vec<AttributeGroup> = Vec::new();
    let mut start: Option<usize> = None;
    let mut keyword_start: Option<usize> = None;
    let mut modifiers: Vec<String> = Vec::new();
    let mut boundary = tokens[open].span.end;
    let mut i = open + 1;

    while i < close {
        let token = tokens[i];
        match token.kind {
            TokenKind::AttrOpen => match AttributeGroup::parse(source, lexed, i) {
                Some(group) => {
                    start.get_or_insert(group.span.start);
                    i = group.next;
                    attributes.push(group);
                }
                None => i += 1,
            },
            TokenKind::Name if MODIFIERS.iter().any(|m| token.is_keyword(source, m)) => {
                start.get_or_insert(token.span.start);
                keyword_start.get_or_insert(token.span.start);
                modifiers.push(token.text(source).to_ascii_lowercase());
                i += 1;
            }
            TokenKind::Name if token.is_keyword(source, "function") => {
                let decl_start = *start.get_or_insert(token.span.start);
                let keyword = *keyword_start.get_or_insert(token.span.start);
                let mut j = i + 1;
                if tokens.get(j).is_some_and(|t| t.text(source) == "&") {
                    j += 1;
                }
                let name = tokens.get(j).filter(|t| t.kind == TokenKind::Name).copied();
                let params = tokens
                    .get(j + 1)
                    .filter(|t| t.kind == TokenKind::OpenParen)
                    .and_then(|t| t.partner);
                let (Some(name), Some(params)) = (name, params) else {
                    i += 1;
                    continue;
                };
                let Some(terminator) = (params + 1..close).find(|k| {
                    matches!(tokens[*k].kind, TokenKind::OpenBrace | TokenKind::Semicolon)
                }) else {
                    break;
                };
                let last = match tokens[terminator].kind {
                    TokenKind::OpenBrace => tokens[terminator].partner.unwrap_or(terminator),
                    _ => terminator,
                };
                methods.push(MethodDecl {
                    name: name.text(source).to_string(),
                    name_span: name.span,
                    start: decl_start,
                    keyword_start: keyword,
                    end: tokens[last].span.end,
                    attributes: std::mem::take(&mut attributes),
                    doc_comment: lexed.doc_comment_between(boundary, decl_start),
                    modifiers: std::mem::take(&mut modifiers),
                });
                start = None;
                keyword_start = None;
                boundary = tokens[last].span.end;
                i = last + 1;
            }
            TokenKind::Semicolon => {
                attributes.clear();
                modifiers.clear();
                start = None;
                keyword_start = None;
                boundary = token.span.end;
                i += 1;
            }
            TokenKind::OpenBrace => {
                // Trait adaptation blocks and the like.
                let end = token.partner.unwrap_or(i);
                attributes.clear();
                modifiers.clear();
                start = None;
                keyword_start = None;
                boundary = tokens[end].span.end;
                i = end + 1;
            }
            TokenKind::OpenParen | TokenKind::OpenBracket => {
                i = token.partner.unwrap_or(i) + 1;
            }
            _ => i += 1,
        }
    }
    methods
}
