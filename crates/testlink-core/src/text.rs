//! Text position utilities for byte offsets, line:column conversions and line layout.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Columns count bytes, not characters
//!
//! The line-layout helpers (`line_start`, `line_end`, `indentation_at`, ...)
//! are what modifiers use to decide whether a declaration sits on its own
//! line and how a new one should be indented.

// ============================================================================
// Position Conversions
// ============================================================================

/// Convert a byte offset to 1-indexed line and column.
///
/// If `offset` exceeds content length, returns position at end of content.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(content.len());
    let mut line = 1u32;
    let mut col = 1u32;

    for &byte in &content.as_bytes()[..offset] {
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Convert 1-indexed line and column to byte offset.
///
/// Columns count bytes. If the position is beyond the content, returns the
/// content length; a column past the end of its line clamps to the line end.
pub fn position_to_byte_offset(content: &str, line: u32, col: u32) -> usize {
    let line = line.max(1);
    let col = col.max(1);

    let mut current_line = 1u32;
    let mut line_begin = 0usize;
    for (i, byte) in content.bytes().enumerate() {
        if current_line == line {
            break;
        }
        if byte == b'\n' {
            current_line += 1;
            line_begin = i + 1;
        }
    }
    if current_line != line {
        return content.len();
    }

    let end = line_end(content, line_begin);
    (line_begin + (col as usize - 1)).min(end)
}

// ============================================================================
// Line Layout
// ============================================================================

/// Byte offset of the first byte of the line containing `offset`.
pub fn line_start(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0)
}

/// Byte offset of the `\n` ending the line containing `offset`
/// (or the content length on the last line).
pub fn line_end(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[offset..]
        .find('\n')
        .map(|p| offset + p)
        .unwrap_or(content.len())
}

/// Byte offset just past the line containing `offset`, including its `\n`.
pub fn next_line_start(content: &str, offset: usize) -> usize {
    let end = line_end(content, offset);
    if end < content.len() {
        end + 1
    } else {
        end
    }
}

/// The run of spaces and tabs that starts the line containing `offset`.
pub fn indentation_at(content: &str, offset: usize) -> &str {
    let start = line_start(content, offset);
    let rest = &content[start..];
    let width = rest
        .bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    &rest[..width]
}

/// True when only spaces and tabs precede `offset` on its line.
pub fn only_whitespace_before(content: &str, offset: usize) -> bool {
    let start = line_start(content, offset);
    content[start..offset]
        .bytes()
        .all(|b| b == b' ' || b == b'\t')
}

/// True when only whitespace follows `offset` up to the end of its line.
pub fn only_whitespace_after(content: &str, offset: usize) -> bool {
    let end = line_end(content, offset);
    content[offset..end]
        .bytes()
        .all(|b| b == b' ' || b == b'\t' || b == b'\r')
}

/// Offset of the first byte at or after `offset` that is not a space or tab.
pub fn skip_inline_whitespace(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    offset
        + content[offset..]
            .bytes()
            .take_while(|b| *b == b' ' || *b == b'\t')
            .count()
}

/// Line ending used by the content (`"\r\n"` when the first line ends that way).
pub fn line_ending(content: &str) -> &'static str {
    match content.find('\n') {
        Some(p) if p > 0 && content.as_bytes()[p - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod positions {
        use super::*;

        #[test]
        fn offset_zero_is_line_one_col_one() {
            assert_eq!(byte_offset_to_position("abc", 0), (1, 1));
        }

        #[test]
        fn offset_after_newline_starts_next_line() {
            let text = "ab\ncd";
            assert_eq!(byte_offset_to_position(text, 3), (2, 1));
            assert_eq!(byte_offset_to_position(text, 4), (2, 2));
        }

        #[test]
        fn offset_past_end_clamps() {
            assert_eq!(byte_offset_to_position("ab", 99), (1, 3));
        }

        #[test]
        fn position_round_trips() {
            let text = "one\ntwo\nthree";
            let offset = position_to_byte_offset(text, 3, 2);
            assert_eq!(&text[offset..], "hree");
            assert_eq!(byte_offset_to_position(text, offset), (3, 2));
        }

        #[test]
        fn position_beyond_line_clamps_to_line_end() {
            let text = "ab\ncd";
            assert_eq!(position_to_byte_offset(text, 1, 10), 2);
            assert_eq!(position_to_byte_offset(text, 9, 1), text.len());
        }
    }

    mod layout {
        use super::*;

        const TEXT: &str = "class A\n{\n    #[Test]\n    public function x() {}\n}\n";

        #[test]
        fn line_bounds() {
            let attr = TEXT.find("#[Test]").unwrap();
            assert_eq!(&TEXT[line_start(TEXT, attr)..attr], "    ");
            assert_eq!(&TEXT[attr..line_end(TEXT, attr)], "#[Test]");
            assert_eq!(
                &TEXT[next_line_start(TEXT, attr)..][..10],
                "    public"
            );
        }

        #[test]
        fn indentation_of_line() {
            let public = TEXT.find("public").unwrap();
            assert_eq!(indentation_at(TEXT, public), "    ");
            assert_eq!(indentation_at(TEXT, 0), "");
        }

        #[test]
        fn whitespace_predicates() {
            let attr = TEXT.find("#[Test]").unwrap();
            assert!(only_whitespace_before(TEXT, attr));
            assert!(only_whitespace_after(TEXT, attr + "#[Test]".len()));
            assert!(!only_whitespace_after(TEXT, attr));
        }

        #[test]
        fn detects_crlf() {
            assert_eq!(line_ending("a\r\nb"), "\r\n");
            assert_eq!(line_ending("a\nb"), "\n");
            assert_eq!(line_ending("a"), "\n");
        }

        #[test]
        fn skip_spaces() {
            assert_eq!(skip_inline_whitespace("a  \tb", 1), 4);
            assert_eq!(skip_inline_whitespace("a", 5), 1);
        }
    }
}
