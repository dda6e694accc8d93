use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{unify_path, HelperError, HelperResult};

/// A reference to a file that can be stored with both absolute and relative paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoFileReference {
    /// Path relative to the workspace root
    pub rel_path: PathBuf,
    /// Absolute path at the time the record was written
    pub abs_path: Option<PathBuf>,
}

impl UndoFileReference {
    /// Creates a reference to `path` relative to `workspace_root`
    pub fn new(path: &Path, workspace_root: &Path) -> Self {
        let abs_path = unify_path(path);
        let root = unify_path(workspace_root);
        let rel_path = abs_path
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));

        Self {
            rel_path,
            abs_path: Some(abs_path),
        }
    }

    /// Resolves the reference: the absolute path if it still exists, otherwise the relative
    /// path under `workspace_root` (for workspaces that were moved).
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        match &self.abs_path {
            Some(abs) if abs.exists() => abs.clone(),
            _ => workspace_root.join(&self.rel_path),
        }
    }
}

/// Information about a replacement operation for undo purposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoInfo {
    /// Identifier, the operation time in milliseconds since the Unix epoch
    pub id: u64,
    /// Description of the operation
    pub description: String,
    /// Original files and their backups
    pub backups: Vec<(UndoFileReference, UndoFileReference)>,
    /// Size of the backups in bytes
    pub total_size: u64,
    /// Number of files modified
    pub file_count: usize,
}

impl UndoInfo {
    /// Path of the record for `id` inside `undo_dir`
    pub fn record_path(undo_dir: &Path, id: u64) -> PathBuf {
        undo_dir.join(format!("{}.json", id))
    }

    /// Writes the record. An existing record with the same id is never overwritten.
    pub fn save(&self, undo_dir: &Path) -> HelperResult<PathBuf> {
        fs::create_dir_all(undo_dir)?;
        let path = Self::record_path(undo_dir, self.id);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| HelperError::undo_error(format!("Cannot write undo record {}: {}", self.id, e)))?;
        file.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        Ok(path)
    }

    pub fn load(undo_dir: &Path, id: u64) -> HelperResult<Self> {
        let path = Self::record_path(undo_dir, id);
        let content = fs::read_to_string(&path).map_err(|e| {
            HelperError::undo_error(format!("No undo record {} ({})", id, e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
