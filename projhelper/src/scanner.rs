use ignore::{Walk, WalkBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::errors::{HelperError, HelperResult};
use crate::filters::{in_ignored_dir, should_include_file};

/// The set of files an operation covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum SearchScope {
    /// A single file
    File(PathBuf),
    /// The direct children of a directory
    Directory(PathBuf),
    /// A directory and all of its descendants
    Recursive(PathBuf),
}

impl SearchScope {
    /// Picks a scope for `path`: directories become `Recursive` or `Directory`, anything else
    /// (including a path that does not exist) is treated as a single file.
    pub fn from_path(path: impl Into<PathBuf>, recursive: bool) -> Self {
        let path = path.into();
        if path.is_dir() {
            if recursive {
                Self::Recursive(path)
            } else {
                Self::Directory(path)
            }
        } else {
            Self::File(path)
        }
    }

    pub fn root(&self) -> &Path {
        match self {
            Self::File(p) | Self::Directory(p) | Self::Recursive(p) => p,
        }
    }
}

/// Name-based filters applied while scanning directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    /// Extensions to include; `None` includes every extension
    pub file_extensions: Option<Vec<String>>,
    /// Glob patterns, matched against paths relative to the scope root
    pub ignore_patterns: Vec<String>,
}

/// Enumerates the files of a scope in a stable, path-sorted order
#[derive(Debug, Clone)]
pub struct FileScanner {
    scope: SearchScope,
    filter: ScanFilter,
}

impl FileScanner {
    pub fn new(scope: SearchScope, filter: ScanFilter) -> Self {
        Self { scope, filter }
    }

    pub fn scope(&self) -> &SearchScope {
        &self.scope
    }

    /// Starts a fresh, lazy walk over the scope.
    ///
    /// A directory scope whose root does not exist is an error; a missing single file is not,
    /// so that the caller can report it alongside the other per-file outcomes.
    pub fn files(&self) -> HelperResult<ScanIter> {
        match &self.scope {
            SearchScope::File(path) => {
                trace!("Scanning single file: {}", path.display());
                Ok(ScanIter::Single(Some(path.clone())))
            }
            SearchScope::Directory(root) | SearchScope::Recursive(root) => {
                if !root.is_dir() {
                    return Err(HelperError::file_not_found(root));
                }
                debug!("Scanning directory: {}", root.display());

                let mut builder = WalkBuilder::new(root);
                builder
                    .hidden(true)
                    .git_ignore(true)
                    .require_git(false)
                    .sort_by_file_path(|a, b| a.cmp(b));
                if matches!(self.scope, SearchScope::Directory(_)) {
                    builder.max_depth(Some(1));
                }

                Ok(ScanIter::Walk {
                    walk: builder.build(),
                    root: root.clone(),
                    filter: self.filter.clone(),
                })
            }
        }
    }

    /// Collects the whole scan into a list
    pub fn scan(&self) -> HelperResult<Vec<PathBuf>> {
        let files: Vec<PathBuf> = self.files()?.collect();
        debug!("Found {} files to process", files.len());
        Ok(files)
    }
}

/// Lazy iterator over the files of a scope
pub enum ScanIter {
    Single(Option<PathBuf>),
    Walk {
        walk: Walk,
        root: PathBuf,
        filter: ScanFilter,
    },
}

impl Iterator for ScanIter {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        match self {
            ScanIter::Single(path) => path.take(),
            ScanIter::Walk { walk, root, filter } => loop {
                let entry = match walk.next()? {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }

                let path = entry.into_path();
                let relative = path.strip_prefix(root.as_path()).unwrap_or(&path);
                if in_ignored_dir(relative)
                    || !should_include_file(
                        relative,
                        &filter.file_extensions,
                        &filter.ignore_patterns,
                    )
                {
                    trace!("Filtered out: {}", path.display());
                    continue;
                }
                return Some(path);
            },
        }
    }
}
