/// Error types for projhelper.
///
/// Every fallible operation in the library returns [`HelperResult`]. Errors fall into two
/// groups that callers treat differently:
///
/// 1. **Up-front errors** (`InvalidPattern`, `ConfigError`, a missing scope root) abort an
///    operation before any file is touched.
/// 2. **Per-file errors** (`FileNotFound`, `PermissionDenied`, `EncodingError`, `IoError`) are
///    recorded against the file that produced them so a multi-file batch keeps going:
///    ```rust,ignore
///    for outcome in &report.files {
///        if let Err(e) = &outcome.outcome {
///            eprintln!("{}: {}", outcome.path.display(), e);
///        }
///    }
///    ```
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for projhelper operations
pub type HelperResult<T> = Result<T, HelperError>;

/// Errors that can occur while searching, replacing or checking files
#[derive(Error, Debug)]
pub enum HelperError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Undo error: {0}")]
    UndoError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Cannot decode {path} as {encoding}")]
    EncodingError { path: PathBuf, encoding: String },
    #[error("Replacement text cannot be represented as {encoding} in {path}")]
    UnmappableReplacement { path: PathBuf, encoding: String },
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl HelperError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn undo_error(msg: impl Into<String>) -> Self {
        Self::UndoError(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, encoding: impl Into<String>) -> Self {
        Self::EncodingError {
            path: path.into(),
            encoding: encoding.into(),
        }
    }

    pub fn unmappable_replacement(path: impl Into<PathBuf>, encoding: impl Into<String>) -> Self {
        Self::UnmappableReplacement {
            path: path.into(),
            encoding: encoding.into(),
        }
    }

    /// Maps an I/O error on `path` to the matching per-file variant
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::file_not_found(path),
            io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}
