/// Search result types.
///
/// A search produces one [`FileResult`] per file that matched, each holding its [`Match`]es in
/// file order. [`SearchOutput`] aggregates them with counters, including the files that could
/// not be read so callers can report them without the whole search failing.
use serde::Serialize;
use std::path::PathBuf;

/// Represents a single match in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// The 1-based line number where the match was found
    pub line_number: usize,
    /// The content of the line containing the match, without its line terminator
    pub line_content: String,
    /// The start byte offset of the match within the line
    pub start: usize,
    /// The end byte offset (exclusive) of the match within the line
    pub end: usize,
    /// Lines before the match for context
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_before: Vec<(usize, String)>,
    /// Lines after the match for context
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_after: Vec<(usize, String)>,
}

impl Match {
    /// The matched text
    pub fn text(&self) -> &str {
        &self.line_content[self.start..self.end]
    }
}

/// A match together with the file it was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMatch {
    pub path: PathBuf,
    #[serde(flatten)]
    pub matched: Match,
}

/// Represents all matches found in a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    /// The path to the file
    pub path: PathBuf,
    /// All matches found in the file
    pub matches: Vec<Match>,
}

/// A file that could not be searched
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Represents the complete search results
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutput {
    /// Results per file with at least one match
    pub file_results: Vec<FileResult>,
    /// Files that could not be read or decoded
    pub failures: Vec<FileFailure>,
    /// Total number of matches found
    pub total_matches: usize,
    /// Total number of files searched
    pub files_searched: usize,
    /// Total number of files with matches
    pub files_with_matches: usize,
}

impl SearchOutput {
    /// Creates a new empty search result
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a file result to the search results
    pub fn add_file_result(&mut self, file_result: FileResult) {
        self.files_searched += 1;
        if !file_result.matches.is_empty() {
            self.total_matches += file_result.matches.len();
            self.files_with_matches += 1;
            self.file_results.push(file_result);
        }
    }

    /// Records a file that failed to process
    pub fn add_failure(&mut self, path: PathBuf, error: impl ToString) {
        self.failures.push(FileFailure {
            path,
            error: error.to_string(),
        });
    }

    /// Paths of the files that matched, in search order
    pub fn matched_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.file_results.iter().map(|fr| &fr.path)
    }
}
