//! Argument expression grammar for link declarations.
//!
//! Link arguments are constant expressions: string literals, `Foo::class`
//! constants, and `.` concatenations of both, optionally behind a named
//! argument label.
//!
//! ## Grammar
//!
//! ```text
//! <argument> := [<ident> ":"] <concat>
//! <concat>   := <atom> ("." <atom>)*
//! <atom>     := <single-quoted> | <double-quoted> | ["\"] <name> "::" "class"
//! ```
//!
//! Anything else (variables, calls, interpolated strings) is rejected; the
//! caller decides whether that is an error or just an opaque argument.

use thiserror::Error;
use winnow::ascii::multispace0;
use winnow::combinator::{alt, delimited, not, opt, preceded, repeat, separated, terminated};
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::{any, none_of, take_while};
use winnow::ModalResult;

use crate::imports::Imports;

/// An argument that is not a supported constant expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported argument expression '{text}'")]
pub struct ArgumentError {
    pub text: String,
}

/// One operand of a concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// A string literal, escapes already decoded.
    Literal(String),
    /// `Name::class`, with the name as written.
    ClassConstant(String),
}

/// A parsed argument expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    /// Named-argument label (`method: ...`).
    pub name: Option<String>,
    pub atoms: Vec<Atom>,
}

impl Expr {
    /// Evaluate to a string, resolving class constants through `imports`.
    pub fn resolve(&self, imports: &Imports) -> String {
        self.atoms
            .iter()
            .map(|atom| match atom {
                Atom::Literal(text) => text.clone(),
                Atom::ClassConstant(name) => imports.resolve(name),
            })
            .collect()
    }

    /// The value when every operand is a literal.
    pub fn literal(&self) -> Option<String> {
        self.atoms
            .iter()
            .map(|atom| match atom {
                Atom::Literal(text) => Some(text.as_str()),
                Atom::ClassConstant(_) => None,
            })
            .collect()
    }

    /// True for a lone `Name::class` operand.
    pub fn is_class_constant(&self) -> bool {
        matches!(self.atoms.as_slice(), [Atom::ClassConstant(_)])
    }
}

/// Parse the text of one argument.
pub fn parse_argument(text: &str) -> Result<Expr, ArgumentError> {
    delimited(multispace0, parse_expr, multispace0)
        .parse(text)
        .map_err(|_| ArgumentError {
            text: text.trim().to_string(),
        })
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

fn parse_expr(input: &mut &str) -> ModalResult<Expr> {
    let name = opt(parse_label).parse_next(input)?;
    let atoms: Vec<Atom> =
        separated(1.., parse_atom, (multispace0, '.', multispace0)).parse_next(input)?;
    Ok(Expr { name, atoms })
}

/// `ident:` but not `ident::`.
fn parse_label(input: &mut &str) -> ModalResult<String> {
    terminated(
        parse_ident,
        (multispace0, ':', not(':'), multispace0),
    )
    .map(str::to_string)
    .parse_next(input)
}

fn parse_ident<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    let checkpoint = *input;
    let ident: &str =
        take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)?;
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        *input = checkpoint;
        return Err(ErrMode::from_input(input));
    }
    Ok(ident)
}

fn parse_atom(input: &mut &str) -> ModalResult<Atom> {
    alt((
        parse_single_quoted.map(Atom::Literal),
        parse_double_quoted.map(Atom::Literal),
        parse_class_constant.map(Atom::ClassConstant),
    ))
    .parse_next(input)
}

/// `'...'` with `\'` and `\\` decoded; other backslashes are literal.
fn parse_single_quoted(input: &mut &str) -> ModalResult<String> {
    delimited(
        '\'',
        repeat(
            0..,
            alt((
                "\\\\".value('\\'),
                "\\'".value('\''),
                none_of(['\'']),
            )),
        ),
        '\'',
    )
    .parse_next(input)
}

/// `"..."` without interpolation.
fn parse_double_quoted(input: &mut &str) -> ModalResult<String> {
    delimited(
        '"',
        repeat(0.., alt((parse_escape, none_of(['"', '\\', '$']).map(String::from))))
            .fold(String::new, |mut acc, part: String| {
                acc.push_str(&part);
                acc
            }),
        '"',
    )
    .parse_next(input)
}

fn parse_escape(input: &mut &str) -> ModalResult<String> {
    preceded('\\', any)
        .map(|c: char| match c {
            '\\' | '"' | '$' => c.to_string(),
            'n' => "\n".to_string(),
            't' => "\t".to_string(),
            other => format!("\\{other}"),
        })
        .parse_next(input)
}

/// `Name::class`, `\Ns\Name::class`.
fn parse_class_constant(input: &mut &str) -> ModalResult<String> {
    let leading = opt('\\').parse_next(input)?;
    let first = parse_ident(input)?;
    let rest: Vec<&str> = repeat(0.., preceded('\\', parse_ident)).parse_next(input)?;
    (multispace0, "::", multispace0).parse_next(input)?;
    let keyword = parse_ident(input)?;
    if !keyword.eq_ignore_ascii_case("class") {
        return Err(ErrMode::from_input(input));
    }

    let mut name = String::new();
    if leading.is_some() {
        name.push('\\');
    }
    name.push_str(first);
    for segment in rest {
        name.push('\\');
        name.push_str(segment);
    }
    Ok(name)
}

// ============================================================================
// Tests
// ============================================================================
