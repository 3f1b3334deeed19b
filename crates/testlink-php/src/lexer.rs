//! A span-preserving PHP tokenizer.
//!
//! Only what declaration parsing needs is distinguished: names, variables,
//! strings, attribute openers, `->`, `::`, brackets and a few punctuation
//! marks. Everything else is `Other`. Comments are dropped, except doc
//! comments (`/** ... */`), whose spans are kept separately.
//!
//! Every bracket token records the index of its partner, so parsers can skip
//! whole argument lists and bodies in one step. Unbalanced brackets and
//! unterminated strings, comments or heredocs are syntax errors.

use testlink_core::patch::Span;
use testlink_core::SyntaxError;

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or qualified name (`foo`, `App\Foo`, `\App\Foo`).
    Name,
    /// `$name`.
    Variable,
    /// Quoted string, heredoc or nowdoc.
    String,
    /// Numeric literal.
    Number,
    /// `#[`
    AttrOpen,
    /// `->` or `?->`
    Arrow,
    /// `::`
    DoubleColon,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,
    Dot,
    Colon,
    /// Anything else.
    Other,
}

/// One token with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Index of the matching bracket, for bracket tokens.
    pub partner: Option<usize>,
}

impl Token {
    /// The token's text.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.slice(source)
    }

    /// True for a name token equal to `name`, ignoring ASCII case.
    pub fn is_keyword(&self, source: &str, name: &str) -> bool {
        self.kind == TokenKind::Name && self.text(source).eq_ignore_ascii_case(name)
    }
}

/// Tokenizer output.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    /// Spans of `/** ... */` comments, in source order.
    pub doc_comments: Vec<Span>,
}

/// One comma-separated argument of a bracketed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub span: Span,
    pub text: String,
}

impl Lexed {
    /// Split the list opened by the bracket token at `open` into arguments.
    ///
    /// Nested brackets are skipped whole. Empty slots (a trailing comma) are
    /// dropped.
    pub fn arguments(&self, source: &str, open: usize) -> Vec<Argument> {
        let Some(close) = self.tokens.get(open).and_then(|t| t.partner) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut first: Option<usize> = None;
        let mut last = open;
        let mut i = open + 1;
        while i < close {
            let token = self.tokens[i];
            if token.kind == TokenKind::Comma {
                if let Some(f) = first.take() {
                    out.push(self.argument(source, f, last));
                }
                i += 1;
                continue;
            }
            first.get_or_insert(i);
            let next = match token.partner {
                Some(p) if p > i => p,
                _ => i,
            };
            last = next;
            i = next + 1;
        }
        if let Some(f) = first {
            out.push(self.argument(source, f, last));
        }
        out
    }

    fn argument(&self, source: &str, first: usize, last: usize) -> Argument {
        let span = Span::new(self.tokens[first].span.start, self.tokens[last].span.end);
        Argument {
            span,
            text: span.slice(source).to_string(),
        }
    }

    /// The doc comment ending in `[from, to)`, if any.
    pub fn doc_comment_between(&self, from: usize, to: usize) -> Option<Span> {
        self.doc_comments
            .iter()
            .rev()
            .find(|d| d.start >= from && d.end <= to)
            .copied()
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Tokenize PHP source.
///
/// Text before the first `<?php` (or `<?=`) and after a `?>` is inline HTML
/// and produces no tokens. Source without any open tag is treated as code.
pub fn tokenize(source: &str) -> Result<Lexed, SyntaxError> {
    Lexer {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        out: Lexed::default(),
        stack: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    out: Lexed,
    stack: Vec<usize>,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Lexed, SyntaxError> {
        if self.source.contains("<?") {
            self.skip_inline_html();
        }

        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            let start = self.pos;

            if b.is_ascii_whitespace() {
                self.pos += 1;
                continue;
            }

            match b {
                b'?' if self.peek_is(1, b'>') => {
                    self.pos += 2;
                    self.skip_inline_html();
                }
                b'#' if self.peek_is(1, b'[') => {
                    self.pos += 2;
                    self.open(TokenKind::AttrOpen, start);
                }
                b'#' => self.skip_line_comment(),
                b'/' if self.peek_is(1, b'/') => self.skip_line_comment(),
                b'/' if self.peek_is(1, b'*') => self.block_comment()?,
                b'\'' | b'"' | b'`' => {
                    self.quoted(b)?;
                    self.push(TokenKind::String, start);
                }
                b'<' if self.source[start..].starts_with("<<<") => {
                    self.heredoc()?;
                    self.push(TokenKind::String, start);
                }
                b'$' if self.bytes.get(start + 1).is_some_and(|c| is_ident_start(*c)) => {
                    self.pos += 1;
                    self.take_ident();
                    self.push(TokenKind::Variable, start);
                }
                b'\\' if self.bytes.get(start + 1).is_some_and(|c| is_ident_start(*c)) => {
                    self.pos += 1;
                    self.take_name();
                    self.push(TokenKind::Name, start);
                }
                _ if is_ident_start(b) => {
                    self.take_name();
                    self.push(TokenKind::Name, start);
                }
                _ if b.is_ascii_digit() => {
                    while self.pos < self.bytes.len()
                        && (self.bytes[self.pos].is_ascii_alphanumeric()
                            || self.bytes[self.pos] == b'_')
                    {
                        self.pos += 1;
                    }
                    self.push(TokenKind::Number, start);
                }
                b'-' if self.peek_is(1, b'>') => {
                    self.pos += 2;
                    self.push(TokenKind::Arrow, start);
                }
                b'?' if self.source[start..].starts_with("?->") => {
                    self.pos += 3;
                    self.push(TokenKind::Arrow, start);
                }
                b':' if self.peek_is(1, b':') => {
                    self.pos += 2;
                    self.push(TokenKind::DoubleColon, start);
                }
                b'(' => {
                    self.pos += 1;
                    self.open(TokenKind::OpenParen, start);
                }
                b'{' => {
                    self.pos += 1;
                    self.open(TokenKind::OpenBrace, start);
                }
                b'[' => {
                    self.pos += 1;
                    self.open(TokenKind::OpenBracket, start);
                }
                b')' => self.close(TokenKind::CloseParen, start)?,
                b'}' => self.close(TokenKind::CloseBrace, start)?,
                b']' => self.close(TokenKind::CloseBracket, start)?,
                b',' => self.single(TokenKind::Comma, start),
                b';' => self.single(TokenKind::Semicolon, start),
                b':' => self.single(TokenKind::Colon, start),
                b'.' if !self.peek_is(1, b'.') && !self.peek_is(1, b'=') => {
                    self.single(TokenKind::Dot, start)
                }
                _ => {
                    let width = self.source[start..]
                        .chars()
                        .next()
                        .map(char::len_utf8)
                        .unwrap_or(1);
                    self.pos += width;
                    self.push(TokenKind::Other, start);
                }
            }
        }

        if let Some(&open) = self.stack.last() {
            let token = self.out.tokens[open];
            return Err(SyntaxError::at(
                self.source,
                token.span.start,
                format!("unclosed '{}'", token.text(self.source)),
            ));
        }
        Ok(self.out)
    }

    fn peek_is(&self, ahead: usize, byte: u8) -> bool {
        self.bytes.get(self.pos + ahead) == Some(&byte)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.out.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
            partner: None,
        });
    }

    fn single(&mut self, kind: TokenKind, start: usize) {
        self.pos += 1;
        self.push(kind, start);
    }

    fn open(&mut self, kind: TokenKind, start: usize) {
        self.stack.push(self.out.tokens.len());
        self.push(kind, start);
    }

    fn close(&mut self, kind: TokenKind, start: usize) -> Result<(), SyntaxError> {
        let expected = match kind {
            TokenKind::CloseParen => [TokenKind::OpenParen, TokenKind::OpenParen],
            TokenKind::CloseBrace => [TokenKind::OpenBrace, TokenKind::OpenBrace],
            _ => [TokenKind::OpenBracket, TokenKind::AttrOpen],
        };
        let closer = self.bytes[start] as char;
        let Some(open) = self.stack.pop() else {
            return Err(SyntaxError::at(
                self.source,
                start,
                format!("unmatched '{}'", closer),
            ));
        };
        if !expected.contains(&self.out.tokens[open].kind) {
            let opener = self.out.tokens[open].text(self.source).to_string();
            return Err(SyntaxError::at(
                self.source,
                start,
                format!("'{}' does not close '{}'", closer, opener),
            ));
        }
        let index = self.out.tokens.len();
        self.pos += 1;
        self.push(kind, start);
        self.out.tokens[index].partner = Some(open);
        self.out.tokens[open].partner = Some(index);
        Ok(())
    }

    fn skip_inline_html(&mut self) {
        let rest = &self.source[self.pos..];
        match rest.find("<?") {
            Some(offset) => {
                let tag_start = self.pos + offset;
                let tail = &self.source[tag_start..];
                self.pos = if tail.get(..5).is_some_and(|t| t.eq_ignore_ascii_case("<?php")) {
                    tag_start + 5
                } else if tail.starts_with("<?=") {
                    tag_start + 3
                } else {
                    tag_start + 2
                };
            }
            None => self.pos = self.bytes.len(),
        }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\n' => return,
                b'?' if self.peek_is(1, b'>') => return,
                _ => self.pos += 1,
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        match self.source[start + 2..].find("*/") {
            Some(offset) => {
                self.pos = start + 2 + offset + 2;
                let is_doc = self.source[start..].starts_with("/**") && self.pos - start > 4;
                if is_doc {
                    self.out.doc_comments.push(Span::new(start, self.pos));
                }
                Ok(())
            }
            None => Err(SyntaxError::at(self.source, start, "unterminated comment")),
        }
    }

    fn quoted(&mut self, quote: u8) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(SyntaxError::at(self.source, start, "unterminated string"))
    }

    fn heredoc(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 3;
        while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b' ' | b'\t') {
            self.pos += 1;
        }
        let quote = match self.bytes.get(self.pos) {
            Some(&q @ (b'\'' | b'"')) => {
                self.pos += 1;
                Some(q)
            }
            _ => None,
        };
        let label_start = self.pos;
        self.take_ident();
        let label = &self.source[label_start..self.pos];
        if label.is_empty() {
            return Err(SyntaxError::at(self.source, start, "invalid heredoc label"));
        }
        if let Some(q) = quote {
            if self.bytes.get(self.pos) != Some(&q) {
                return Err(SyntaxError::at(self.source, start, "invalid heredoc label"));
            }
            self.pos += 1;
        }

        let Some(newline) = self.source[self.pos..].find('\n') else {
            return Err(SyntaxError::at(self.source, start, "unterminated heredoc"));
        };
        let mut line = self.pos + newline + 1;
        while line <= self.bytes.len() {
            let mut p = line;
            while p < self.bytes.len() && matches!(self.bytes[p], b' ' | b'\t') {
                p += 1;
            }
            let after = p + label.len();
            if self.source[p..].starts_with(label)
                && self.bytes.get(after).is_none_or(|b| !is_ident_continue(*b))
            {
                self.pos = after;
                return Ok(());
            }
            match self.source[line..].find('\n') {
                Some(offset) => line += offset + 1,
                None => break,
            }
        }
        Err(SyntaxError::at(self.source, start, "unterminated heredoc"))
    }

    fn take_ident(&mut self) {
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn take_name(&mut self) {
        self.take_ident();
        while self.peek_is(0, b'\\') && self.bytes.get(self.pos + 1).is_some_and(|c| is_ident_start(*c)) {
            self.pos += 1;
            self.take_ident();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
