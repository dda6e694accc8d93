/// Search: find where a pattern occurs in a scope.
///
/// The pipeline is sequential and lazy:
///
/// 1. [`crate::scanner::FileScanner`] walks the scope in path order
/// 2. [`FileProcessor`] reads and decodes one file at a time
/// 3. [`PatternMatcher`] reports byte ranges per line
///
/// ```rust,ignore
/// let searcher = Searcher::from_config(SearchQuery::new(pattern, scope), &config)?;
/// for item in searcher.matches()? {
///     match item {
///         Ok(m) => println!("{}:{}:{}", m.path.display(), m.matched.line_number, m.matched.start),
///         Err(e) => eprintln!("{}", e),
///     }
/// }
/// ```
pub mod engine;
pub mod matcher;
pub mod processor;

pub use engine::{search, MatchIter, SearchQuery, Searcher};
pub use matcher::{PatternDefinition, PatternKind, PatternMatcher};
pub use processor::FileProcessor;
