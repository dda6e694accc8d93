//! Project-wide search, replace and sanity checks over plain text files.
//!
//! Every operation is sequential: files are opened, processed and closed one at a time, and
//! rewritten files are replaced atomically.
pub mod check;
pub mod config;
pub mod encoding;
pub mod errors;
pub mod filters;
pub mod replace;
pub mod results;
pub mod scanner;
pub mod search;
pub mod workspace;

pub use check::{check_file, check_scope, CheckIssue, CheckReport, IssueKind};
pub use config::{CliOverrides, HelperConfig};
pub use encoding::{EncodingMode, TextCodec};
pub use errors::{HelperError, HelperResult};
pub use replace::{
    list_undo_operations, replace_in_file, replace_in_scope, undo_by_id, FileReplacement,
    PreviewResult, ReplacementConfig, ReplacementPattern, ReplacementReport, ReplacementSet,
    UndoInfo,
};
pub use results::{FileMatch, FileResult, Match, SearchOutput};
pub use scanner::{FileScanner, ScanFilter, SearchScope};
pub use search::{search, PatternDefinition, PatternKind, PatternMatcher, SearchQuery, Searcher};
pub use workspace::{init_workspace, Workspace};
