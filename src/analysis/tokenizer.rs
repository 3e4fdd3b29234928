//! Line tokenizer for report files.
//!
//! A section starts at a line whose trimmed text equals a known title and
//! runs until the next known title or end of file. Sections may appear in
//! any order, and any of them may be absent.

use super::types::SectionName;

/// Classification of a non-blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Title(SectionName),
    Comment,
    Content,
}

/// A trimmed, non-blank line with its 0-based index in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub index: usize,
    pub text: &'a str,
    pub kind: LineKind,
}

impl Line<'_> {
    /// 1-based line number for diagnostics.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Line range of one section: the title line and the exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    pub section: SectionName,
    pub title_line: usize,
    pub end: usize,
}

pub struct Tokenizer<'a> {
    raw: Vec<&'a str>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self {
            raw: text.lines().collect(),
        }
    }

    fn classify(index: usize, raw: &'a str) -> Option<Line<'a>> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        let kind = if let Some(section) = SectionName::from_title(text) {
            LineKind::Title(section)
        } else if text.starts_with('#') {
            LineKind::Comment
        } else {
            LineKind::Content
        };
        Some(Line { index, text, kind })
    }

    /// All non-blank lines, lazily, in file order.
    pub fn lines(&self) -> impl Iterator<Item = Line<'a>> + '_ {
        self.raw
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| Self::classify(i, *raw))
    }

    fn lines_in(&self, start: usize, end: usize) -> impl Iterator<Item = Line<'a>> + '_ {
        let end = end.min(self.raw.len());
        let start = start.min(end);
        self.raw[start..end]
            .iter()
            .enumerate()
            .filter_map(move |(offset, raw)| Self::classify(start + offset, *raw))
    }

    /// Index of the first line whose trimmed text equals the section title.
    pub fn find_section(&self, name: SectionName) -> Option<usize> {
        self.lines()
            .find(|line| line.kind == LineKind::Title(name))
            .map(|line| line.index)
    }

    /// Span from the section title to the next recognised title or EOF.
    pub fn section_span(&self, name: SectionName) -> Option<SectionSpan> {
        let title_line = self.find_section(name)?;
        let end = self
            .lines_in(title_line + 1, self.raw.len())
            .find(|line| matches!(line.kind, LineKind::Title(_)))
            .map(|line| line.index)
            .unwrap_or(self.raw.len());
        Some(SectionSpan {
            section: name,
            title_line,
            end,
        })
    }

    /// Content lines of a section; comments and blanks are skipped.
    pub fn section_lines(&self, span: SectionSpan) -> impl Iterator<Item = Line<'a>> + '_ {
        self.lines_in(span.title_line + 1, span.end)
            .filter(|line| line.kind == LineKind::Content)
    }

    /// Every `#` comment line in the file.
    pub fn comments(&self) -> impl Iterator<Item = Line<'a>> + '_ {
        self.lines().filter(|line| line.kind == LineKind::Comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "\
# Scenario 3: SF impact
PER_NODE_STATS
NodeID,Sent

0,10
OVERALL_STATS
TotalSent,10
";

    #[test]
    fn test_lines_skip_blanks() {
        let tok = Tokenizer::new(TEXT);
        let lines: Vec<_> = tok.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].kind, LineKind::Comment);
        assert_eq!(lines[1].kind, LineKind::Title(SectionName::PerNodeStats));
        assert_eq!(lines[3].index, 4);
    }

    #[test]
    fn test_sections_in_any_order() {
        let tok = Tokenizer::new(TEXT);
        let nodes = tok.section_span(SectionName::PerNodeStats).unwrap();
        assert_eq!((nodes.title_line, nodes.end), (1, 5));
        let overall = tok.section_span(SectionName::OverallStats).unwrap();
        assert_eq!((overall.title_line, overall.end), (5, 7));

        let content: Vec<_> = tok.section_lines(nodes).map(|l| l.text).collect();
        assert_eq!(content, vec!["NodeID,Sent", "0,10"]);
    }

    #[test]
    fn test_absent_section_is_none() {
        let tok = Tokenizer::new(TEXT);
        assert_eq!(tok.find_section(SectionName::Configuration), None);
        assert_eq!(tok.section_span(SectionName::PerGatewayStats), None);
    }

    #[test]
    fn test_title_must_match_whole_line() {
        let tok = Tokenizer::new("OVERALL_STATS_V2\n  OVERALL_STATS  \r\nTotalSent,1\r\n");
        assert_eq!(tok.find_section(SectionName::OverallStats), Some(1));
    }
}
