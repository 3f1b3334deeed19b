//! Namespace and `use` import resolution.

use crate::lexer::{Lexed, TokenKind};

/// The namespace and class imports of one file.
///
/// Files declaring several namespaces keep the first one; test and
/// production files in PSR-4 layouts declare exactly one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Imports {
    /// Declared namespace, without leading or trailing separators.
    pub namespace: String,
    /// `(alias, fully qualified name)` in declaration order.
    pub uses: Vec<(String, String)>,
}

impl Imports {
    /// Collect the namespace declaration and top-level class imports.
    ///
    /// Trait uses inside class bodies and closure `use (...)` clauses are
    /// ignored, as are `use function` and `use const`.
    pub fn from_tokens(source: &str, lexed: &Lexed) -> Imports {
        let tokens = &lexed.tokens;
        let mut imports = Imports::default();
        let mut namespace_seen = false;
        // One entry per open brace: true for a braced namespace body.
        let mut braces: Vec<bool> = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            match token.kind {
                TokenKind::OpenBrace => {
                    braces.push(false);
                    i += 1;
                }
                TokenKind::CloseBrace => {
                    braces.pop();
                    i += 1;
                }
                TokenKind::Name if braces.is_empty() && token.is_keyword(source, "namespace") => {
                    let name = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Name);
                    let after = if name.is_some() { i + 2 } else { i + 1 };
                    if let Some(name) = name {
                        if !namespace_seen {
                            imports.namespace = name.text(source).trim_start_matches('\\').to_string();
                            namespace_seen = true;
                        }
                    }
                    if tokens.get(after).is_some_and(|t| t.kind == TokenKind::OpenBrace) {
                        braces.push(true);
                        i = after + 1;
                    } else {
                        i = after;
                    }
                }
                TokenKind::Name
                    if braces.iter().all(|b| *b) && token.is_keyword(source, "use") =>
                {
                    i = imports.parse_use(source, lexed, i + 1);
                }
                _ => i += 1,
            }
        }
        imports
    }

    /// Parse one `use` statement starting after the keyword; returns the
    /// index after its terminating `;`.
    fn parse_use(&mut self, source: &str, lexed: &Lexed, mut i: usize) -> usize {
        let tokens = &lexed.tokens;
        let end = tokens[i..]
            .iter()
            .position(|t| t.kind == TokenKind::Semicolon)
            .map(|p| i + p)
            .unwrap_or(tokens.len());

        // Closure `use (...)`: resume after the parameter list.
        if let Some(open) = tokens.get(i).filter(|t| t.kind == TokenKind::OpenParen) {
            return open.partner.map_or(i + 1, |close| close + 1);
        }
        if tokens
            .get(i)
            .is_some_and(|t| t.is_keyword(source, "function") || t.is_keyword(source, "const"))
        {
            return end + 1;
        }

        // `use A\{B, C as D};`
        let mut prefix = String::new();
        if let (Some(name), Some(sep), Some(open)) =
            (tokens.get(i), tokens.get(i + 1), tokens.get(i + 2))
        {
            if name.kind == TokenKind::Name
                && sep.text(source) == "\\"
                && open.kind == TokenKind::OpenBrace
            {
                prefix = format!("{}\\", name.text(source).trim_start_matches('\\'));
                i += 3;
            }
        }

        while i < end {
            let token = tokens[i];
            if token.kind != TokenKind::Name {
                i += 1;
                continue;
            }
            let full = format!("{}{}", prefix, token.text(source).trim_start_matches('\\'));
            let mut alias = full.rsplit('\\').next().unwrap_or(&full).to_string();
            i += 1;
            if tokens.get(i).is_some_and(|t| t.is_keyword(source, "as")) {
                if let Some(a) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Name) {
                    alias = a.text(source).to_string();
                }
                i += 2;
            }
            self.uses.push((alias, full));
        }
        end + 1
    }

    /// Resolve a class name as written to its fully qualified form.
    pub fn resolve(&self, name: &str) -> String {
        if let Some(stripped) = name.strip_prefix('\\') {
            return stripped.to_string();
        }
        let (first, rest) = match name.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        if let Some((_, full)) = self.uses.iter().find(|(a, _)| a.eq_ignore_ascii_case(first)) {
            return match rest {
                Some(rest) => format!("{full}\\{rest}"),
                None => full.clone(),
            };
        }
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}\\{}", self.namespace, name)
        }
    }

    /// The alias under which `fqcn` is imported, if any.
    pub fn alias_for(&self, fqcn: &str) -> Option<&str> {
        let fqcn = fqcn.trim_start_matches('\\');
        self.uses
            .iter()
            .find(|(_, full)| full.eq_ignore_ascii_case(fqcn))
            .map(|(alias, _)| alias.as_str())
    }

    /// How to write `fqcn` in this file: the alias when imported, the short
    /// name when it lives in the file's namespace and no import shadows it,
    /// else fully qualified.
    pub fn reference_to(&self, fqcn: &str) -> String {
        let fqcn = fqcn.trim_start_matches('\\');
        if let Some(alias) = self.alias_for(fqcn) {
            return alias.to_string();
        }
        let (namespace, short) = fqcn.rsplit_once('\\').unwrap_or(("", fqcn));
        let shadowed = self.uses.iter().any(|(a, _)| a.eq_ignore_ascii_case(short));
        if namespace == self.namespace && !shadowed {
            short.to_string()
        } else {
            format!("\\{fqcn}")
        }
    }
}
