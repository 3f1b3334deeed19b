//! Unified diffs between two versions of a file.
//!
//! Used for `sync --dry-run`. Common leading and trailing lines are trimmed
//! before a line-level LCS runs on the remainder, so the cost is driven by
//! the size of the change rather than the size of the file.

/// Lines of context around each hunk.
pub const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Render a unified diff of `before` → `after` for `path`.
///
/// Returns an empty string when the texts are equal.
pub fn unified_diff(path: &str, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    let old: Vec<&str> = before.split_inclusive('\n').collect();
    let new: Vec<&str> = after.split_inclusive('\n').collect();
    let script = edit_script(&old, &new);

    let mut out = String::new();
    out.push_str(&format!("--- a/{}\n", path));
    out.push_str(&format!("+++ b/{}\n", path));

    for (start, end) in hunk_ranges(&script) {
        let (mut old_line, mut new_line) = (1usize, 1usize);
        for (op, _, _) in &script[..start] {
            match op {
                Op::Equal => {
                    old_line += 1;
                    new_line += 1;
                }
                Op::Delete => old_line += 1,
                Op::Insert => new_line += 1,
            }
        }
        let hunk = &script[start..end];
        let old_count = hunk.iter().filter(|(op, _, _)| *op != Op::Insert).count();
        let new_count = hunk.iter().filter(|(op, _, _)| *op != Op::Delete).count();
        let old_start = if old_count == 0 { old_line - 1 } else { old_line };
        let new_start = if new_count == 0 { new_line - 1 } else { new_line };
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_start, old_count, new_start, new_count
        ));

        for (op, old_idx, new_idx) in hunk {
            let (prefix, line) = match op {
                Op::Equal => (' ', old[*old_idx]),
                Op::Delete => ('-', old[*old_idx]),
                Op::Insert => ('+', new[*new_idx]),
            };
            out.push(prefix);
            out.push_str(line.trim_end_matches('\n'));
            out.push('\n');
            if !line.ends_with('\n') {
                out.push_str("\\ No newline at end of file\n");
            }
        }
    }
    out
}

/// Line-level edit script: `(op, old index, new index)` per step.
fn edit_script(old: &[&str], new: &[&str]) -> Vec<(Op, usize, usize)> {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    // lcs[i][j] = LCS length of old_mid[i..] and new_mid[j..]
    let (n, m) = (old_mid.len(), new_mid.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old_mid[i] == new_mid[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut script: Vec<(Op, usize, usize)> = (0..prefix).map(|k| (Op::Equal, k, k)).collect();
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && old_mid[i] == new_mid[j] {
            script.push((Op::Equal, prefix + i, prefix + j));
            i += 1;
            j += 1;
        } else if i < n && (j == m || lcs[i + 1][j] >= lcs[i][j + 1]) {
            script.push((Op::Delete, prefix + i, prefix + j));
            i += 1;
        } else {
            script.push((Op::Insert, prefix + i, prefix + j));
            j += 1;
        }
    }
    for k in 0..suffix {
        script.push((Op::Equal, old.len() - suffix + k, new.len() - suffix + k));
    }
    script
}

/// Script index ranges of hunks, each change padded with context and
/// overlapping ranges merged.
fn hunk_ranges(script: &[(Op, usize, usize)]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (idx, (op, _, _)) in script.iter().enumerate() {
        if *op == Op::Equal {
            continue;
        }
        let start = idx.saturating_sub(CONTEXT_LINES);
        let end = (idx + 1 + CONTEXT_LINES).min(script.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_texts_produce_no_diff() {
        assert_eq!(unified_diff("a.php", "x\n", "x\n"), "");
    }

    #[test]
    fn single_insertion_with_context() {
        let before = "a\nb\nc\nd\ne\nf\ng\n";
        let after = "a\nb\nc\nd\nNEW\ne\nf\ng\n";
        let diff = unified_diff("tests/ATest.php", before, after);
        assert_eq!(
            diff,
            "--- a/tests/ATest.php\n+++ b/tests/ATest.php\n@@ -2,6 +2,7 @@\n b\n c\n d\n+NEW\n e\n f\n g\n"
        );
    }

    #[test]
    fn replacement_shows_both_sides() {
        let diff = unified_diff("x", "one\ntwo\n", "one\nTWO\n");
        assert!(diff.contains("-two\n+TWO\n"));
        assert!(diff.contains("@@ -1,2 +1,2 @@"));
    }

    #[test]
    fn distant_changes_make_separate_hunks() {
        let before: String = (0..20).map(|i| format!("{i}\n")).collect();
        let after: String = (0..20)
            .map(|i| match i {
                2 => "two\n".to_string(),
                17 => "seventeen\n".to_string(),
                _ => format!("{i}\n"),
            })
            .collect();
        let diff = unified_diff("x", &before, &after);
        assert_eq!(diff.matches("@@ -").count(), 2);
    }

    #[test]
    fn missing_trailing_newline_is_marked() {
        let diff = unified_diff("x", "a\nb", "a\nc");
        assert!(diff.contains("-b\n\\ No newline at end of file\n+c\n\\ No newline at end of file\n"));
    }
}
