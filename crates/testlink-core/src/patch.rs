//! Splice IR: byte spans and labelled text edits for minimal-diff rewrites.
//!
//! Source files are treated as opaque byte sequences. Modifiers compute a
//! small set of splices (insert, delete, replace) over spans produced by the
//! parsers and apply them in a single pass:
//! - Splices are sorted by position before applying
//! - Overlapping splices are rejected as conflicts
//! - Bytes outside every splice are copied verbatim

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Hash type for content verification (SHA-256, stored as hex string for JSON compatibility).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 hash of the given bytes, returning hex-encoded string.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        ContentHash(hex::encode(result))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Span
// ============================================================================

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// An empty span at `offset`.
    pub fn at(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Two spans overlap if they share any byte positions.
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The text this span covers in `source`.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Splices
// ============================================================================

/// The kind of text operation a splice performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpliceKind {
    /// Insert text at `span.start` (span is empty).
    Insert,
    /// Delete the bytes in `span`.
    Delete,
    /// Replace the bytes in `span` with new text.
    Replace,
}

/// A single text change over a byte span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splice {
    /// The kind of operation.
    pub kind: SpliceKind,
    /// Target bytes (empty for inserts).
    pub span: Span,
    /// The new text (empty for deletes).
    pub text: String,
}

impl Splice {
    /// Insert `text` at `offset`.
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Splice {
            kind: SpliceKind::Insert,
            span: Span::at(offset),
            text: text.into(),
        }
    }

    /// Delete the bytes in `span`.
    pub fn delete(span: Span) -> Self {
        Splice {
            kind: SpliceKind::Delete,
            span,
            text: String::new(),
        }
    }

    /// Replace the bytes in `span` with `text`.
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Splice {
            kind: SpliceKind::Replace,
            span,
            text: text.into(),
        }
    }
}

/// Reasons a set of splices cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpliceError {
    /// Two splices touch the same bytes.
    #[error("overlapping splices at {first} and {second}")]
    Overlap { first: Span, second: Span },

    /// A splice points past the end of the text, or inside a UTF-8 sequence.
    #[error("splice {span} is out of bounds for text of {len} bytes")]
    OutOfBounds { span: Span, len: usize },
}

/// Apply splices to `source` in one pass.
///
/// Splices are ordered by span start; two inserts at the same offset keep
/// their relative order. Any overlap between non-empty spans, or between an
/// insert and the interior of a deleted span, is a conflict.
pub fn apply_splices(source: &str, splices: &[Splice]) -> Result<String, SpliceError> {
    if splices.is_empty() {
        return Ok(source.to_string());
    }

    let mut ordered: Vec<&Splice> = splices.iter().collect();
    ordered.sort_by_key(|s| (s.span.start, s.span.end));

    for splice in &ordered {
        let span = splice.span;
        if span.end > source.len()
            || !source.is_char_boundary(span.start)
            || !source.is_char_boundary(span.end)
        {
            return Err(SpliceError::OutOfBounds {
                span,
                len: source.len(),
            });
        }
    }

    for pair in ordered.windows(2) {
        let (a, b) = (pair[0].span, pair[1].span);
        let conflict = a.overlaps(&b) || (b.is_empty() && a.start < b.start && b.start < a.end);
        if conflict {
            return Err(SpliceError::Overlap {
                first: a,
                second: b,
            });
        }
    }

    let added: usize = ordered.iter().map(|s| s.text.len()).sum();
    let mut out = String::with_capacity(source.len() + added);
    let mut cursor = 0usize;
    for splice in ordered {
        out.push_str(&source[cursor..splice.span.start]);
        out.push_str(&splice.text);
        cursor = splice.span.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
