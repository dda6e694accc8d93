use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::matcher::{PatternDefinition, PatternMatcher};
use super::processor::FileProcessor;
use crate::config::HelperConfig;
use crate::encoding::TextCodec;
use crate::errors::HelperResult;
use crate::results::{FileMatch, SearchOutput};
use crate::scanner::{FileScanner, ScanFilter, ScanIter, SearchScope};

/// A pattern and the files to look for it in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub pattern: PatternDefinition,
    pub scope: SearchScope,
}

impl SearchQuery {
    pub fn new(pattern: PatternDefinition, scope: SearchScope) -> Self {
        Self { pattern, scope }
    }
}

/// Runs one query. The pattern is compiled on construction, so an invalid pattern is
/// reported before any file is opened.
#[derive(Debug, Clone)]
pub struct Searcher {
    scanner: FileScanner,
    processor: FileProcessor,
}

impl Searcher {
    pub fn new(query: SearchQuery, filter: ScanFilter, codec: TextCodec) -> HelperResult<Self> {
        let matcher = PatternMatcher::new(query.pattern)?;
        Ok(Self {
            scanner: FileScanner::new(query.scope, filter),
            processor: FileProcessor::new(matcher, codec),
        })
    }

    /// Builds a searcher using the filters, encoding and context settings of `config`
    pub fn from_config(query: SearchQuery, config: &HelperConfig) -> HelperResult<Self> {
        let searcher = Self::new(query, config.scan_filter(), config.codec()?)?;
        Ok(searcher.with_context(config.context_before, config.context_after))
    }

    pub fn with_context(mut self, before: usize, after: usize) -> Self {
        self.processor = self.processor.with_context(before, after);
        self
    }

    /// Lazily yields matches, one file at a time, in scan order.
    ///
    /// Each call starts a fresh walk. A file that cannot be read yields one `Err` item and the
    /// iteration continues with the next file.
    pub fn matches(&self) -> HelperResult<MatchIter<'_>> {
        Ok(MatchIter {
            files: self.scanner.files()?,
            processor: &self.processor,
            pending: Vec::new().into_iter(),
        })
    }

    /// Runs the whole search and summarizes it
    pub fn search(&self) -> HelperResult<SearchOutput> {
        info!(
            "Starting search for '{}' in {}",
            self.processor.matcher().definition().text,
            self.scanner.scope().root().display()
        );

        let mut output = SearchOutput::new();
        for path in self.scanner.files()? {
            match self.processor.process_file(&path) {
                Ok(file_result) => output.add_file_result(file_result),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    output.add_failure(path, e);
                }
            }
        }

        info!(
            "Search complete. Found {} matches in {} files ({} searched, {} failed)",
            output.total_matches,
            output.files_with_matches,
            output.files_searched,
            output.failures.len()
        );
        Ok(output)
    }
}

/// Lazy sequence of matches produced by [`Searcher::matches`]
pub struct MatchIter<'a> {
    files: ScanIter,
    processor: &'a FileProcessor,
    pending: std::vec::IntoIter<FileMatch>,
}

impl Iterator for MatchIter<'_> {
    type Item = HelperResult<FileMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.pending.next() {
                return Some(Ok(found));
            }

            let path: PathBuf = self.files.next()?;
            match self.processor.process_file(&path) {
                Ok(file_result) => {
                    debug!(
                        "{} matches in {}",
                        file_result.matches.len(),
                        path.display()
                    );
                    let path = file_result.path;
                    self.pending = file_result
                        .matches
                        .into_iter()
                        .map(|matched| FileMatch {
                            path: path.clone(),
                            matched,
                        })
                        .collect::<Vec<_>>()
                        .into_iter();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Searches `scope` for `pattern` with the settings of `config`
pub fn search(
    config: &HelperConfig,
    pattern: PatternDefinition,
    scope: SearchScope,
) -> HelperResult<SearchOutput> {
    Searcher::from_config(SearchQuery::new(pattern, scope), config)?.search()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HelperError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_search_counts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("test.txt"), "test line\ntest line 2\n").unwrap();
        fs::write(dir.path().join("other.txt"), "nothing\n").unwrap();

        let result = search(
            &HelperConfig::default(),
            PatternDefinition::literal("test"),
            SearchScope::Recursive(dir.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(result.files_searched, 2);
        assert_eq!(result.files_with_matches, 1);
        assert_eq!(result.total_matches, 2);
    }

    #[test]
    fn test_lazy_matches_continue_after_failure() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "foo\n").unwrap();
        fs::write(dir.path().join("b.txt"), b"foo \xFF\n").unwrap();
        fs::write(dir.path().join("c.txt"), "foo foo\n").unwrap();

        let searcher = Searcher::new(
            SearchQuery::new(
                PatternDefinition::literal("foo"),
                SearchScope::Recursive(dir.path().to_path_buf()),
            ),
            ScanFilter::default(),
            TextCodec::default(),
        )
        .unwrap();

        let items: Vec<_> = searcher.matches().unwrap().collect();
        assert_eq!(items.len(), 4);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(HelperError::EncodingError { .. })));
        assert_eq!(items.iter().filter(|i| i.is_ok()).count(), 3);

        // Restartable
        assert_eq!(searcher.matches().unwrap().count(), 4);
    }

    #[test]
    fn test_invalid_pattern_fails_before_scanning() {
        let result = Searcher::new(
            SearchQuery::new(
                PatternDefinition::regex("(unclosed"),
                SearchScope::Recursive(PathBuf::from("/definitely/not/here")),
            ),
            ScanFilter::default(),
            TextCodec::default(),
        );
        assert!(matches!(result, Err(HelperError::InvalidPattern(_))));
    }
}
