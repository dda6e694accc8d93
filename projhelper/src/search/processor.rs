use std::path::Path;
use tracing::trace;

use super::matcher::PatternMatcher;
use crate::encoding::{read_text, TextCodec};
use crate::errors::HelperResult;
use crate::results::{FileResult, Match};

/// Splits text into `(line, terminator)` pairs.
///
/// The terminator is `"\r\n"`, `"\n"` or `""` for a final unterminated line, so concatenating
/// every pair reproduces the input exactly.
pub(crate) fn split_lines(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.split_inclusive('\n').map(|chunk| {
        if let Some(body) = chunk.strip_suffix("\r\n") {
            (body, "\r\n")
        } else if let Some(body) = chunk.strip_suffix('\n') {
            (body, "\n")
        } else {
            (chunk, "")
        }
    })
}

/// Reads files and collects the matches of one pattern
#[derive(Debug, Clone)]
pub struct FileProcessor {
    matcher: PatternMatcher,
    codec: TextCodec,
    context_before: usize,
    context_after: usize,
}

impl FileProcessor {
    /// Creates a new FileProcessor with the given pattern matcher
    pub fn new(matcher: PatternMatcher, codec: TextCodec) -> Self {
        Self {
            matcher,
            codec,
            context_before: 0,
            context_after: 0,
        }
    }

    /// Sets how many lines of context to collect around each match
    pub fn with_context(mut self, before: usize, after: usize) -> Self {
        self.context_before = before;
        self.context_after = after;
        self
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Processes a file and returns any matches found
    pub fn process_file(&self, path: &Path) -> HelperResult<FileResult> {
        trace!("Processing file: {}", path.display());
        let decoded = read_text(path, &self.codec)?;
        Ok(FileResult {
            path: path.to_path_buf(),
            matches: self.find_in_text(&decoded.text),
        })
    }

    /// Finds every match in already-decoded text
    pub fn find_in_text(&self, contents: &str) -> Vec<Match> {
        let lines: Vec<&str> = split_lines(contents).map(|(line, _)| line).collect();
        let mut matches = Vec::new();

        for (line_index, line) in lines.iter().enumerate() {
            let found = self.matcher.find_matches(line);
            if found.is_empty() {
                continue;
            }
            let line_number = line_index + 1;

            // Collect context before
            let context_before: Vec<(usize, String)> = (line_index
                .saturating_sub(self.context_before)..line_index)
                .map(|i| (i + 1, lines[i].to_string()))
                .collect();

            // Collect context after
            let context_after: Vec<(usize, String)> = (1..=self.context_after)
                .filter_map(|i| {
                    lines
                        .get(line_index + i)
                        .map(|line| (line_number + i, line.to_string()))
                })
                .collect();

            matches.extend(found.into_iter().map(|(start, end)| Match {
                line_number,
                line_content: line.to_string(),
                start,
                end,
                context_before: context_before.clone(),
                context_after: context_after.clone(),
            }));
        }

        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::EncodingMode;
    use crate::errors::HelperError;
    use crate::search::matcher::PatternDefinition;
    use std::fs;
    use tempfile::tempdir;

    fn processor(pattern: PatternDefinition) -> FileProcessor {
        FileProcessor::new(PatternMatcher::new(pattern).unwrap(), TextCodec::default())
    }

    #[test]
    fn test_split_lines_reproduces_input() {
        let text = "a\r\nb\n\nc";
        let pairs: Vec<_> = split_lines(text).collect();
        assert_eq!(pairs, vec![("a", "\r\n"), ("b", "\n"), ("", "\n"), ("c", "")]);
        let rebuilt: String = pairs.iter().map(|(l, t)| format!("{}{}", l, t)).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_columns_and_line_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foo.txt");
        fs::write(&path, "foo bar foo\r\nnothing\nlast foo").unwrap();

        let result = processor(PatternDefinition::literal("foo"))
            .process_file(&path)
            .unwrap();
        let positions: Vec<_> = result
            .matches
            .iter()
            .map(|m| (m.line_number, m.start, m.end))
            .collect();
        assert_eq!(positions, vec![(1, 0, 3), (1, 8, 11), (3, 5, 8)]);
        assert_eq!(result.matches[0].line_content, "foo bar foo");
    }

    #[test]
    fn test_context_lines() {
        let text = "one\ntwo\nthree match\nfour\nfive\n";
        let matches = processor(PatternDefinition::literal("match"))
            .with_context(1, 2)
            .find_in_text(text);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].context_before, vec![(2, "two".to_string())]);
        assert_eq!(
            matches[0].context_after,
            vec![(4, "four".to_string()), (5, "five".to_string())]
        );
    }

    #[test]
    fn test_context_clamped_at_file_edges() {
        let matches = processor(PatternDefinition::literal("x"))
            .with_context(3, 3)
            .find_in_text("x\ny");
        assert!(matches[0].context_before.is_empty());
        assert_eq!(matches[0].context_after, vec![(2, "y".to_string())]);
    }

    #[test]
    fn test_missing_file_and_bad_encoding() {
        let dir = tempdir().unwrap();
        let p = processor(PatternDefinition::literal("foo"));

        let err = p.process_file(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, HelperError::FileNotFound(_)));

        let bad = dir.path().join("bad.txt");
        fs::write(&bad, b"foo \xFF\xFE").unwrap();
        let err = p.process_file(&bad).unwrap_err();
        assert!(matches!(err, HelperError::EncodingError { .. }));

        let lossy = FileProcessor::new(
            PatternMatcher::new(PatternDefinition::literal("foo")).unwrap(),
            TextCodec::new(EncodingMode::Lossy, None).unwrap(),
        );
        assert_eq!(lossy.process_file(&bad).unwrap().matches.len(), 1);
    }

    #[test]
    fn test_many_lines_in_order() {
        let mut content = String::new();
        for i in 0..2000 {
            content.push_str(&format!("Line {} with pattern_split", i));
            if i % 3 == 0 {
                content.push_str(" extra text to vary line length");
            }
            content.push('\n');
        }

        let matches = processor(PatternDefinition::regex(r"pattern_\w+")).find_in_text(&content);
        assert_eq!(matches.len(), 2000);
        let mut prev_line = 0;
        for m in &matches {
            assert!(m.line_number > prev_line);
            assert_eq!(m.text(), "pattern_split");
            prev_line = m.line_number;
        }
    }
}
