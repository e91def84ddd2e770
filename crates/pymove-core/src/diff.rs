//! Diffing two versions of a document into minimal edits.
//!
//! The matcher follows the classic longest-matching-block recursion: find the
//! longest common run, recurse on both sides of it, and collapse adjacent
//! runs. No element is ever treated as junk, so results are exact for any
//! input size.
//!
//! Documents are first narrowed to the region between their common prefix
//! and suffix, matched line by line, and then each differing line region is
//! refined character by character. The output is a list of [`EditBlock`]s
//! (byte offsets into the original) or position-addressed [`TextEdit`]s.

use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

use crate::edit::{Range, TextEdit};
use crate::text::{position_to_offset, positions_for_offsets};

/// Line regions larger than this (in bytes, on either side) are replaced
/// wholesale instead of refined per character.
const CHAR_REFINE_LIMIT: usize = 16 * 1024;

/// Context lines around each unified diff hunk.
const UNIFIED_CONTEXT: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// Errors applying edits to a document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    /// Two edits cover overlapping bytes.
    #[error("overlapping edits at byte {offset}")]
    OverlappingEdits { offset: usize },

    /// An edit reaches past the end of the document or splits a character.
    #[error("edit {start}+{length} is outside the document (length {len})")]
    OutOfBounds {
        start: usize,
        length: usize,
        len: usize,
    },
}

/// Result type for diff operations.
pub type DiffResult<T> = Result<T, DiffError>;

/// A run of equal elements: `a[a..a+size] == b[b..b+size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// Replace `length` bytes at `start` of the original text with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBlock {
    pub start: usize,
    pub length: usize,
    pub replacement: String,
}

impl EditBlock {
    pub fn new(start: usize, length: usize, replacement: impl Into<String>) -> Self {
        EditBlock {
            start,
            length,
            replacement: replacement.into(),
        }
    }

    /// End offset (exclusive) in the original text.
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

// ============================================================================
// Sequence Matching
// ============================================================================

/// Compute the matching blocks between two sequences.
///
/// Blocks are returned in increasing order and end with the sentinel
/// `MatchingBlock { a: a.len(), b: b.len(), size: 0 }`.
pub fn matching_blocks<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<MatchingBlock> {
    let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in b.iter().enumerate() {
        b2j.entry(item).or_default().push(j);
    }

    let mut queue = vec![(0, a.len(), 0, b.len())];
    let mut found = Vec::new();
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let m = find_longest_match(a, &b2j, alo, ahi, blo, bhi);
        if m.size == 0 {
            continue;
        }
        if alo < m.a && blo < m.b {
            queue.push((alo, m.a, blo, m.b));
        }
        if m.a + m.size < ahi && m.b + m.size < bhi {
            queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
        }
        found.push(m);
    }
    found.sort_by_key(|m| (m.a, m.b));

    let mut collapsed = Vec::with_capacity(found.len() + 1);
    let mut current = MatchingBlock { a: 0, b: 0, size: 0 };
    for m in found {
        if current.a + current.size == m.a && current.b + current.size == m.b {
            current.size += m.size;
        } else {
            if current.size > 0 {
                collapsed.push(current);
            }
            current = m;
        }
    }
    if current.size > 0 {
        collapsed.push(current);
    }
    collapsed.push(MatchingBlock {
        a: a.len(),
        b: b.len(),
        size: 0,
    });
    collapsed
}

fn find_longest_match<T: Eq + Hash>(
    a: &[T],
    b2j: &HashMap<&T, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> MatchingBlock {
    let mut best = MatchingBlock {
        a: alo,
        b: blo,
        size: 0,
    };
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, item) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(item) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
                next.insert(j, k);
                if k > best.size {
                    best = MatchingBlock {
                        a: i + 1 - k,
                        b: j + 1 - k,
                        size: k,
                    };
                }
            }
        }
        j2len = next;
    }
    best
}

// ============================================================================
// Edit Blocks
// ============================================================================

/// Compute the byte-offset edits that turn `original` into `updated`.
///
/// Blocks are ordered by `start`, never overlap, and are all non-empty
/// (either `length > 0` or a non-empty replacement).
pub fn edit_blocks(original: &str, updated: &str) -> Vec<EditBlock> {
    if original == updated {
        return Vec::new();
    }
    let prefix = common_prefix(original, updated);
    let suffix = common_suffix(&original[prefix..], &updated[prefix..]);
    let a = &original[prefix..original.len() - suffix];
    let b = &updated[prefix..updated.len() - suffix];

    let mut blocks = Vec::new();
    diff_lines(a, b, prefix, &mut blocks);
    blocks
}

fn common_prefix(a: &str, b: &str) -> usize {
    let mut p = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while !(a.is_char_boundary(p) && b.is_char_boundary(p)) {
        p -= 1;
    }
    p
}

fn common_suffix(a: &str, b: &str) -> usize {
    let mut s = a
        .bytes()
        .rev()
        .zip(b.bytes().rev())
        .take_while(|(x, y)| x == y)
        .count();
    while !(a.is_char_boundary(a.len() - s) && b.is_char_boundary(b.len() - s)) {
        s -= 1;
    }
    s
}

/// Byte offsets of each line start plus a trailing `len` sentinel.
fn line_offsets(s: &str) -> (Vec<&str>, Vec<usize>) {
    let lines: Vec<&str> = s.split_inclusive('\n').collect();
    let mut offsets = Vec::with_capacity(lines.len() + 1);
    let mut pos = 0;
    for line in &lines {
        offsets.push(pos);
        pos += line.len();
    }
    offsets.push(pos);
    (lines, offsets)
}

fn diff_lines(a: &str, b: &str, base: usize, out: &mut Vec<EditBlock>) {
    let (a_lines, a_offsets) = line_offsets(a);
    let (b_lines, b_offsets) = line_offsets(b);

    let (mut i, mut j) = (0, 0);
    for m in matching_blocks(&a_lines, &b_lines) {
        if i < m.a || j < m.b {
            let a_region = &a[a_offsets[i]..a_offsets[m.a]];
            let b_region = &b[b_offsets[j]..b_offsets[m.b]];
            let region_base = base + a_offsets[i];
            if !a_region.is_empty()
                && !b_region.is_empty()
                && a_region.len() <= CHAR_REFINE_LIMIT
                && b_region.len() <= CHAR_REFINE_LIMIT
            {
                diff_chars(a_region, b_region, region_base, out);
            } else {
                out.push(EditBlock::new(region_base, a_region.len(), b_region));
            }
        }
        i = m.a + m.size;
        j = m.b + m.size;
    }
}

fn diff_chars(a: &str, b: &str, base: usize, out: &mut Vec<EditBlock>) {
    let (a_chars, a_offsets) = char_offsets(a);
    let (b_chars, b_offsets) = char_offsets(b);

    let (mut i, mut j) = (0, 0);
    for m in matching_blocks(&a_chars, &b_chars) {
        if i < m.a || j < m.b {
            out.push(EditBlock::new(
                base + a_offsets[i],
                a_offsets[m.a] - a_offsets[i],
                &b[b_offsets[j]..b_offsets[m.b]],
            ));
        }
        i = m.a + m.size;
        j = m.b + m.size;
    }
}

fn char_offsets(s: &str) -> (Vec<char>, Vec<usize>) {
    let mut chars = Vec::with_capacity(s.len());
    let mut offsets = Vec::with_capacity(s.len() + 1);
    for (idx, ch) in s.char_indices() {
        chars.push(ch);
        offsets.push(idx);
    }
    offsets.push(s.len());
    (chars, offsets)
}

/// Apply edit blocks (all relative to `original`).
pub fn apply_edit_blocks(original: &str, blocks: &[EditBlock]) -> DiffResult<String> {
    let mut sorted: Vec<&EditBlock> = blocks.iter().collect();
    sorted.sort_by_key(|b| (b.start, b.length));

    let mut out = String::with_capacity(original.len());
    let mut cursor = 0;
    for block in sorted {
        let end = block.end();
        if end > original.len()
            || !original.is_char_boundary(block.start)
            || !original.is_char_boundary(end)
        {
            return Err(DiffError::OutOfBounds {
                start: block.start,
                length: block.length,
                len: original.len(),
            });
        }
        if block.start < cursor {
            return Err(DiffError::OverlappingEdits {
                offset: block.start,
            });
        }
        out.push_str(&original[cursor..block.start]);
        out.push_str(&block.replacement);
        cursor = end;
    }
    out.push_str(&original[cursor..]);
    Ok(out)
}

// ============================================================================
// Text Edits
// ============================================================================

/// Compute position-addressed edits that turn `original` into `updated`.
///
/// Positions are 0-based lines and characters in `original`.
pub fn text_edits(original: &str, updated: &str) -> Vec<TextEdit> {
    let blocks = edit_blocks(original, updated);
    let offsets: Vec<usize> = blocks
        .iter()
        .flat_map(|b| [b.start, b.end()])
        .collect();
    let positions = positions_for_offsets(original, &offsets);
    blocks
        .into_iter()
        .zip(positions.chunks(2))
        .map(|(block, pair)| TextEdit::new(Range::new(pair[0], pair[1]), block.replacement))
        .collect()
}

/// Apply position-addressed edits, all expressed against `original`.
pub fn apply_edits(original: &str, edits: &[TextEdit]) -> DiffResult<String> {
    let blocks: Vec<EditBlock> = edits
        .iter()
        .map(|edit| {
            let start = position_to_offset(original, edit.range.start);
            let end = position_to_offset(original, edit.range.end);
            EditBlock::new(start, end.saturating_sub(start), edit.new_text.clone())
        })
        .collect();
    apply_edit_blocks(original, &blocks)
}

// ============================================================================
// Unified Diff
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Copy)]
struct Opcode {
    tag: Tag,
    i1: usize,
    i2: usize,
    j1: usize,
    j2: usize,
}

fn opcodes(blocks: &[MatchingBlock]) -> Vec<Opcode> {
    let mut codes = Vec::new();
    let (mut i, mut j) = (0, 0);
    for m in blocks {
        let tag = match (i < m.a, j < m.b) {
            (true, true) => Some(Tag::Replace),
            (true, false) => Some(Tag::Delete),
            (false, true) => Some(Tag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            codes.push(Opcode {
                tag,
                i1: i,
                i2: m.a,
                j1: j,
                j2: m.b,
            });
        }
        i = m.a + m.size;
        j = m.b + m.size;
        if m.size > 0 {
            codes.push(Opcode {
                tag: Tag::Equal,
                i1: m.a,
                i2: i,
                j1: m.b,
                j2: j,
            });
        }
    }
    codes
}

fn grouped_opcodes(mut codes: Vec<Opcode>, n: usize) -> Vec<Vec<Opcode>> {
    if codes.is_empty() {
        return Vec::new();
    }
    if let Some(first) = codes.first_mut() {
        if first.tag == Tag::Equal {
            first.i1 = first.i1.max(first.i2.saturating_sub(n));
            first.j1 = first.j1.max(first.j2.saturating_sub(n));
        }
    }
    if let Some(last) = codes.last_mut() {
        if last.tag == Tag::Equal {
            last.i2 = last.i2.min(last.i1 + n);
            last.j2 = last.j2.min(last.j1 + n);
        }
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for mut code in codes {
        if code.tag == Tag::Equal && code.i2 - code.i1 > 2 * n {
            group.push(Opcode {
                tag: Tag::Equal,
                i1: code.i1,
                i2: code.i2.min(code.i1 + n),
                j1: code.j1,
                j2: code.j2.min(code.j1 + n),
            });
            groups.push(std::mem::take(&mut group));
            code.i1 = code.i1.max(code.i2.saturating_sub(n));
            code.j1 = code.j1.max(code.j2.saturating_sub(n));
        }
        group.push(code);
    }
    if !group.is_empty() && !(group.len() == 1 && group[0].tag == Tag::Equal) {
        groups.push(group);
    }
    groups
}

fn format_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    match length {
        1 => format!("{}", start + 1),
        0 => format!("{},0", start),
        _ => format!("{},{}", start + 1, length),
    }
}

fn push_line(out: &mut String, prefix: char, line: &str) {
    out.push(prefix);
    out.push_str(line);
    if !line.ends_with('\n') {
        out.push_str("\n\\ No newline at end of file\n");
    }
}

/// Render a unified diff of `original` -> `updated` for `path`.
///
/// Returns an empty string when the texts are equal.
pub fn unified_diff(path: &str, original: &str, updated: &str) -> String {
    if original == updated {
        return String::new();
    }
    let a: Vec<&str> = original.split_inclusive('\n').collect();
    let b: Vec<&str> = updated.split_inclusive('\n').collect();

    let mut out = format!("--- a/{}\n+++ b/{}\n", path, path);
    for group in grouped_opcodes(opcodes(&matching_blocks(&a, &b)), UNIFIED_CONTEXT) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        out.push_str(&format!(
            "@@ -{} +{} @@\n",
            format_range(first.i1, last.i2),
            format_range(first.j1, last.j2)
        ));
        for code in &group {
            match code.tag {
                Tag::Equal => a[code.i1..code.i2]
                    .iter()
                    .for_each(|line| push_line(&mut out, ' ', line)),
                Tag::Delete => a[code.i1..code.i2]
                    .iter()
                    .for_each(|line| push_line(&mut out, '-', line)),
                Tag::Insert => b[code.j1..code.j2]
                    .iter()
                    .for_each(|line| push_line(&mut out, '+', line)),
                Tag::Replace => {
                    a[code.i1..code.i2]
                        .iter()
                        .for_each(|line| push_line(&mut out, '-', line));
                    b[code.j1..code.j2]
                        .iter()
                        .for_each(|line| push_line(&mut out, '+', line));
                }
            }
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Position;

    const S1: &str = "This is a text\nwith several lines\nand some differences\nin places.";
    const S2: &str = "This is the text\nwith several more lines\nand some changes\nin places!\n";

    mod matching {
        use super::*;

        #[test]
        fn identical_sequences_single_block() {
            let a: Vec<char> = "abcdef".chars().collect();
            let blocks = matching_blocks(&a, &a);
            assert_eq!(
                blocks,
                vec![
                    MatchingBlock { a: 0, b: 0, size: 6 },
                    MatchingBlock { a: 6, b: 6, size: 0 }
                ]
            );
        }

        #[test]
        fn classic_example() {
            let a: Vec<char> = "abxcd".chars().collect();
            let b: Vec<char> = "abcd".chars().collect();
            let blocks = matching_blocks(&a, &b);
            assert_eq!(
                blocks,
                vec![
                    MatchingBlock { a: 0, b: 0, size: 2 },
                    MatchingBlock { a: 3, b: 2, size: 2 },
                    MatchingBlock { a: 5, b: 4, size: 0 }
                ]
            );
        }

        #[test]
        fn empty_inputs_only_sentinel() {
            let empty: Vec<char> = Vec::new();
            assert_eq!(
                matching_blocks(&empty, &empty),
                vec![MatchingBlock { a: 0, b: 0, size: 0 }]
            );
        }
    }

    mod blocks {
        use super::*;

        #[test]
        fn applying_blocks_reproduces_updated() {
            let blocks = edit_blocks(S1, S2);
            assert!(!blocks.is_empty());
            assert_eq!(apply_edit_blocks(S1, &blocks).unwrap(), S2);
        }

        #[test]
        fn applying_in_reverse_order_reproduces_updated() {
            let mut text = S1.to_string();
            for block in edit_blocks(S1, S2).iter().rev() {
                text.replace_range(block.start..block.end(), &block.replacement);
            }
            assert_eq!(text, S2);
        }

        #[test]
        fn blocks_are_sorted_and_non_empty() {
            let blocks = edit_blocks(S1, S2);
            for pair in blocks.windows(2) {
                assert!(pair[0].end() <= pair[1].start);
            }
            for block in &blocks {
                assert!(block.length > 0 || !block.replacement.is_empty());
            }
        }

        #[test]
        fn equal_texts_produce_nothing() {
            assert!(edit_blocks(S1, S1).is_empty());
        }

        #[test]
        fn trailing_insertion_is_reported() {
            let blocks = edit_blocks("a = 1\n", "a = 1\nb = 2\n");
            assert_eq!(blocks, vec![EditBlock::new(6, 0, "b = 2\n")]);
        }

        #[test]
        fn single_character_change() {
            let blocks = edit_blocks("x = 1\n", "x = 2\n");
            assert_eq!(blocks, vec![EditBlock::new(4, 1, "2")]);
        }

        #[test]
        fn multibyte_text_stays_on_boundaries() {
            let a = "name = 'héllo'\n";
            let b = "name = 'hèllo'\n";
            let blocks = edit_blocks(a, b);
            assert_eq!(apply_edit_blocks(a, &blocks).unwrap(), b);
        }

        #[test]
        fn overlapping_blocks_rejected() {
            let blocks = vec![EditBlock::new(0, 4, "x"), EditBlock::new(2, 1, "y")];
            assert_eq!(
                apply_edit_blocks("abcdef", &blocks),
                Err(DiffError::OverlappingEdits { offset: 2 })
            );
        }

        #[test]
        fn out_of_bounds_rejected() {
            let blocks = vec![EditBlock::new(4, 10, "x")];
            assert!(matches!(
                apply_edit_blocks("abcdef", &blocks),
                Err(DiffError::OutOfBounds { .. })
            ));
        }
    }

    mod edits {
        use super::*;

        #[test]
        fn text_edits_round_trip() {
            let edits = text_edits(S1, S2);
            assert_eq!(apply_edits(S1, &edits).unwrap(), S2);
        }

        #[test]
        fn edit_positions_are_zero_based() {
            let edits = text_edits("def f():\n    return 1\n", "def f():\n    return 2\n");
            assert_eq!(edits.len(), 1);
            assert_eq!(edits[0].range.start, Position::new(1, 11));
            assert_eq!(edits[0].range.end, Position::new(1, 12));
            assert_eq!(edits[0].new_text, "2");
        }

        #[test]
        fn insertion_at_end_has_empty_range() {
            let edits = text_edits("x = 1\n", "x = 1\ny = 2\n");
            assert_eq!(edits.len(), 1);
            assert_eq!(edits[0].range.start, edits[0].range.end);
            assert_eq!(edits[0].range.start, Position::new(1, 0));
        }
    }

    mod unified {
        use super::*;

        #[test]
        fn equal_texts_render_nothing() {
            assert_eq!(unified_diff("a.py", "x\n", "x\n"), "");
        }

        #[test]
        fn single_line_change() {
            let diff = unified_diff("a.py", "a\nb\nc\n", "a\nB\nc\n");
            assert_eq!(
                diff,
                "--- a/a.py\n+++ b/a.py\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"
            );
        }

        #[test]
        fn distant_changes_form_separate_hunks() {
            let original: String = (1..=20).map(|i| format!("line{}\n", i)).collect();
            let updated = original
                .replace("line2\n", "LINE2\n")
                .replace("line19\n", "LINE19\n");
            let diff = unified_diff("m.py", &original, &updated);
            assert_eq!(diff.matches("@@ -").count(), 2);
            assert!(diff.contains("-line2\n+LINE2\n"));
            assert!(diff.contains("-line19\n+LINE19\n"));
        }

        #[test]
        fn missing_trailing_newline_is_marked() {
            let diff = unified_diff("a.py", "x = 1", "x = 2");
            assert!(diff.contains("-x = 1\n\\ No newline at end of file\n"));
        }
    }
}
