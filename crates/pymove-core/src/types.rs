//! Shared location type used by the CLI and error output.

use serde::{Deserialize, Serialize};

// ============================================================================
// Location Type
// ============================================================================

/// A user-facing source location.
///
/// Lines and columns are 1-indexed, matching what editors display. The
/// refactoring engine itself takes a 1-based line and a 0-based column, so
/// callers convert with [`Location::column_offset`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path (as given, or workspace-relative).
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, characters).
    pub col: u32,
}

impl Location {
    /// Create a new location.
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            line,
            col,
        }
    }

    /// Parse a location from "path:line:col" format.
    ///
    /// This parsing is robust against paths containing colons (e.g., Windows paths).
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.rsplitn(3, ':').collect();
        if parts.len() != 3 {
            return None;
        }
        let col: u32 = parts[0].parse().ok()?;
        let line: u32 = parts[1].parse().ok()?;
        if line == 0 || col == 0 || parts[2].is_empty() {
            return None;
        }
        Some(Location::new(parts[2], line, col))
    }

    /// Parse a "path:line" pair. The column defaults to 1.
    pub fn parse_line(s: &str) -> Option<Self> {
        let (file, line) = s.rsplit_once(':')?;
        let line: u32 = line.parse().ok()?;
        if line == 0 || file.is_empty() {
            return None;
        }
        Some(Location::new(file, line, 1))
    }

    /// The 0-based column the engine expects.
    pub fn column_offset(&self) -> u32 {
        self.col.saturating_sub(1)
    }

    /// Comparison key for deterministic sorting: (file, line, col).
    fn sort_key(&self) -> (&str, u32, u32) {
        (&self.file, self.line, self.col)
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
