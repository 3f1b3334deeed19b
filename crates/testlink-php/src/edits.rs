//! Layout-preserving edit helpers shared by the modifiers.
//!
//! Every helper produces [`Splice`]s against the current text; callers
//! collect them and apply once. Removing a declaration that sits on its own
//! line removes the whole line; anything else removes only the declaration
//! and the inline whitespace next to it.

use testlink_core::patch::{Span, Splice};
use testlink_core::text::{
    indentation_at, line_end, line_ending, line_start, next_line_start, only_whitespace_after,
    only_whitespace_before, skip_inline_whitespace,
};

/// Remove the flagged items of a comma-separated list.
///
/// `items` are the item spans in order and `remove` flags the ones to drop;
/// at least one item must be kept (remove the enclosing construct otherwise).
/// An item followed by a kept item is deleted up to the next item's start,
/// taking its comma along; a trailing run is deleted from the end of the
/// last kept item.
pub fn remove_list_items(items: &[Span], remove: &[bool]) -> Vec<Splice> {
    let Some(last_kept) = (0..items.len()).rev().find(|i| !remove[*i]) else {
        return Vec::new();
    };
    let mut splices = Vec::new();
    for i in 0..last_kept {
        if remove[i] {
            splices.push(Splice::delete(Span::new(items[i].start, items[i + 1].start)));
        }
    }
    if last_kept + 1 < items.len() {
        let last = items[items.len() - 1];
        splices.push(Splice::delete(Span::new(items[last_kept].end, last.end)));
    }
    splices
}

/// Remove a whole construct (an attribute group, a chained call).
///
/// On its own line, the line goes. Otherwise the construct goes with the
/// inline whitespace after it, or before it when nothing follows.
pub fn remove_construct(source: &str, span: Span) -> Splice {
    if only_whitespace_before(source, span.start) && only_whitespace_after(source, span.end) {
        return Splice::delete(Span::new(
            line_start(source, span.start),
            next_line_start(source, span.end),
        ));
    }
    let after = skip_inline_whitespace(source, span.end);
    if after > span.end && !only_whitespace_after(source, span.end) {
        return Splice::delete(Span::new(span.start, after));
    }
    let before = source[..span.start]
        .trim_end_matches([' ', '\t'])
        .len();
    Splice::delete(Span::new(before, span.end))
}

/// Insert a declaration line (an attribute group) near a declaration.
///
/// With `anchors`, the new line goes after the last anchor, matching its
/// indentation, or inline after it when code follows on the same line.
/// Without anchors it goes on its own line above `decl_start`.
pub fn insert_declaration_line(
    source: &str,
    anchors: &[Span],
    decl_start: usize,
    text: &str,
) -> Splice {
    let eol = line_ending(source);
    if let Some(last) = anchors.last() {
        if !only_whitespace_after(source, last.end) {
            return Splice::insert(last.end, format!(" {text}"));
        }
        let indent = indentation_at(source, last.start);
        if line_end(source, last.end) == source.len() {
            return Splice::insert(last.end, format!("{eol}{indent}{text}"));
        }
        return Splice::insert(
            next_line_start(source, last.end),
            format!("{indent}{text}{eol}"),
        );
    }
    if only_whitespace_before(source, decl_start) {
        let indent = indentation_at(source, decl_start);
        Splice::insert(line_start(source, decl_start), format!("{indent}{text}{eol}"))
    } else {
        Splice::insert(decl_start, format!("{text} "))
    }
}
