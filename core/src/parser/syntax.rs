// Source text and positions shared by the parser, checker and diagnostics.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span(pub Range<usize>);

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self(start..end)
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(s: pest::Span<'_>) -> Self {
        Self(s.start()..s.end())
    }
}

/// 1-based line and column (in characters) of a position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Expression text with a precomputed line table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    text: String,
    description: String,
    line_offsets: Vec<usize>,
}

impl Source {
    pub fn new(text: impl Into<String>, description: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_offsets = vec![0];
        line_offsets.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            text,
            description: description.into(),
            line_offsets,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Size of the expression in code points.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.text.len());
        let line_index = match self.line_offsets.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let line_start = self.line_offsets[line_index];
        let column = self
            .text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        Location::new(line_index as u32 + 1, column as u32 + 1)
    }

    /// Text of a 1-based line, without its terminator.
    pub fn line(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        let start = *self.line_offsets.get(index)?;
        let end = self
            .line_offsets
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        self.text.get(start..end).map(|l| l.trim_end_matches('\r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locations_are_one_based() {
        let source = Source::new("a + b\n  && c", "<input>");
        assert_eq!(source.location(0), Location::new(1, 1));
        assert_eq!(source.location(4), Location::new(1, 5));
        assert_eq!(source.location(8), Location::new(2, 3));
        assert_eq!(source.line(2), Some("  && c"));
        assert_eq!(source.line(3), None);
    }

    #[test]
    fn test_columns_count_characters() {
        let source = Source::new("'ééé' + x", "<input>");
        // Each 'é' is two bytes, so `x` sits at byte 11 but column 9.
        assert_eq!(source.location(11), Location::new(1, 9));
    }
}
