//! Text position utilities for byte offsets, line starts and 0-based positions.
//!
//! ## Coordinate Conventions
//!
//! - Byte offsets are **0-indexed** and always land on UTF-8 boundaries
//! - [`Position`] lines and characters are **0-indexed**; characters count
//!   Unicode scalar values
//! - Offsets past the end of the content clamp to the content length

use crate::edit::Position;

// ============================================================================
// Offset <-> Position
// ============================================================================

/// Convert a byte offset to a 0-based line and character position.
///
/// A linear scan over the content. Use [`positions_for_offsets`] when many
/// offsets need converting at once.
pub fn offset_to_position(content: &str, offset: usize) -> Position {
    let offset = clamp_to_boundary(content, offset);
    let mut line = 0u32;
    let mut character = 0u32;
    for ch in content[..offset].chars() {
        if ch == '\n' {
            line += 1;
            character = 0;
        } else {
            character += 1;
        }
    }
    Position::new(line, character)
}

/// Convert a 0-based position to a byte offset.
///
/// A character beyond the end of its line clamps to the line end (before the
/// newline). A line beyond the end of content clamps to the content length.
pub fn position_to_offset(content: &str, position: Position) -> usize {
    let mut line = 0u32;
    let mut line_start = 0usize;
    if position.line > 0 {
        let mut found = false;
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line += 1;
                if line == position.line {
                    line_start = i + 1;
                    found = true;
                    break;
                }
            }
        }
        if !found {
            return content.len();
        }
    }

    let rest = &content[line_start..];
    let mut offset = line_start;
    for (taken, ch) in rest.chars().enumerate() {
        if taken as u32 >= position.character || ch == '\n' {
            break;
        }
        offset += ch.len_utf8();
    }
    offset
}

/// Convert a sorted-or-unsorted batch of byte offsets in one forward pass.
///
/// Returns positions in the same order as `offsets`.
pub fn positions_for_offsets(content: &str, offsets: &[usize]) -> Vec<Position> {
    let mut order: Vec<usize> = (0..offsets.len()).collect();
    order.sort_by_key(|&i| offsets[i]);

    let mut result = vec![Position::new(0, 0); offsets.len()];
    let mut chars = content.char_indices().peekable();
    let mut line = 0u32;
    let mut character = 0u32;

    for i in order {
        let target = clamp_to_boundary(content, offsets[i]);
        while let Some(&(idx, ch)) = chars.peek() {
            if idx >= target {
                break;
            }
            if ch == '\n' {
                line += 1;
                character = 0;
            } else {
                character += 1;
            }
            chars.next();
        }
        result[i] = Position::new(line, character);
    }
    result
}

// ============================================================================
// Line Helpers
// ============================================================================

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Byte offset just past the newline ending the line containing `offset`,
/// or the content length on the last line.
pub fn line_end(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[offset..]
        .find('\n')
        .map(|i| offset + i + 1)
        .unwrap_or(content.len())
}

/// The leading whitespace of the line containing `offset`.
pub fn indentation_at(content: &str, offset: usize) -> &str {
    let start = line_start(content, offset);
    let line = &content[start..];
    let width = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..width]
}

/// Whether only whitespace precedes `offset` on its line.
pub fn is_line_leading(content: &str, offset: usize) -> bool {
    let start = line_start(content, offset);
    content[start..offset.min(content.len())]
        .chars()
        .all(|c| c == ' ' || c == '\t')
}

/// Whether only whitespace (or a comment) follows `offset` on its line.
pub fn is_line_trailing(content: &str, offset: usize) -> bool {
    let offset = offset.min(content.len());
    let end = line_end(content, offset);
    let rest = content[offset..end].trim_start_matches([' ', '\t']);
    rest.is_empty() || rest.starts_with('\n') || rest.starts_with('#') || rest.starts_with("\r\n")
}

/// Count whitespace-only lines immediately before `offset`.
///
/// `offset` is expected to sit at a line start.
pub fn blank_lines_before(content: &str, offset: usize) -> usize {
    let mut count = 0;
    let mut cursor = offset.min(content.len());
    while cursor > 0 {
        let prev_start = line_start(content, cursor - 1);
        if content[prev_start..cursor].trim().is_empty() {
            count += 1;
            cursor = prev_start;
        } else {
            break;
        }
    }
    count
}

/// Count whitespace-only lines starting at `offset`.
///
/// `offset` is expected to sit at a line start.
pub fn blank_lines_after(content: &str, offset: usize) -> usize {
    let mut count = 0;
    let mut cursor = offset.min(content.len());
    while cursor < content.len() {
        let end = line_end(content, cursor);
        let line = &content[cursor..end];
        if line.trim().is_empty() && line.ends_with('\n') {
            count += 1;
            cursor = end;
        } else {
            break;
        }
    }
    count
}

/// Move `offset` down to the nearest UTF-8 boundary, clamped to the content.
fn clamp_to_boundary(content: &str, offset: usize) -> usize {
    let mut offset = offset.min(content.len());
    while !content.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "This is a text\nwith several lines\nand some differences\nin places.";

    mod offset_to_position_tests {
        use super::*;

        #[test]
        fn known_offsets() {
            assert_eq!(offset_to_position(SAMPLE, 0), Position::new(0, 0));
            assert_eq!(offset_to_position(SAMPLE, 5), Position::new(0, 5));
            assert_eq!(offset_to_position(SAMPLE, 30), Position::new(1, 15));
            assert_eq!(offset_to_position(SAMPLE, 50), Position::new(2, 16));
        }

        #[test]
        fn clamps_past_end() {
            let end = offset_to_position(SAMPLE, 10_000);
            assert_eq!(end, Position::new(3, 10));
        }

        #[test]
        fn counts_characters_not_bytes() {
            let content = "s = \"héllo\"\nx";
            // 'x' sits after the 13-byte first line (é is 2 bytes)
            assert_eq!(offset_to_position(content, 13), Position::new(1, 0));
            assert_eq!(offset_to_position(content, 8), Position::new(0, 7));
        }
    }

    mod position_to_offset_tests {
        use super::*;

        #[test]
        fn inverse_of_offset_to_position() {
            for offset in [0, 5, 14, 15, 30, 50, SAMPLE.len()] {
                let pos = offset_to_position(SAMPLE, offset);
                assert_eq!(position_to_offset(SAMPLE, pos), offset);
            }
        }

        #[test]
        fn clamps_character_to_line_end() {
            assert_eq!(position_to_offset(SAMPLE, Position::new(0, 99)), 14);
        }

        #[test]
        fn clamps_line_to_content_end() {
            assert_eq!(position_to_offset(SAMPLE, Position::new(9, 0)), SAMPLE.len());
        }
    }

    mod batch_tests {
        use super::*;

        #[test]
        fn batch_matches_single_conversions() {
            let offsets = [50, 0, 30, 5];
            let batch = positions_for_offsets(SAMPLE, &offsets);
            for (offset, pos) in offsets.iter().zip(batch) {
                assert_eq!(offset_to_position(SAMPLE, *offset), pos);
            }
        }
    }

    mod line_helper_tests {
        use super::*;

        #[test]
        fn line_bounds() {
            assert_eq!(line_start(SAMPLE, 20), 15);
            assert_eq!(line_end(SAMPLE, 20), 34);
            assert_eq!(line_end(SAMPLE, SAMPLE.len() - 1), SAMPLE.len());
        }

        #[test]
        fn indentation_and_leading() {
            let content = "def f():\n    return 1\n";
            assert_eq!(indentation_at(content, 15), "    ");
            assert!(is_line_leading(content, 13));
            assert!(!is_line_leading(content, 15));
            assert!(is_line_trailing(content, 21));
        }

        #[test]
        fn blank_line_counts() {
            let content = "a = 1\n\n\nb = 2\n\n";
            assert_eq!(blank_lines_before(content, 8), 2);
            assert_eq!(blank_lines_before(content, 6), 0);
            assert_eq!(blank_lines_after(content, 6), 2);
            assert_eq!(blank_lines_after(content, 14), 1);
        }
    }
}
