use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{unify_path, HelperResult};

/// Directory holding backups and undo records
pub const WORKSPACE_DIR: &str = ".projhelper";
const BACKUPS_DIR: &str = "backups";
const UNDO_DIR: &str = "undo";
const MAX_UPWARD_STEPS: usize = 20;

/// Locations of the tool's state inside a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Uses `root` as the workspace root without touching the disk
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Finds the workspace that owns `path`
    pub fn detect(path: &Path) -> HelperResult<Self> {
        Ok(Self::at(detect_workspace_root(path)?))
    }

    /// Like [`Workspace::detect`], but when no ancestor holds a workspace yet and `path` lies
    /// inside `project_root`, the project root is used instead of the path's own directory.
    pub fn detect_within(path: &Path, project_root: &Path) -> HelperResult<Self> {
        let starting_dir = starting_dir(path);
        if let Some(found) = find_existing_root(&starting_dir) {
            return Ok(Self::at(found));
        }

        let project_root = unify_path(project_root);
        if project_root.is_dir() && starting_dir.starts_with(&project_root) {
            Ok(Self::at(project_root))
        } else {
            Ok(Self::at(starting_dir))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.state_dir().join(BACKUPS_DIR)
    }

    pub fn undo_dir(&self) -> PathBuf {
        self.state_dir().join(UNDO_DIR)
    }
}

/// Initialize a workspace at the specified directory
pub fn init_workspace(root: &Path) -> HelperResult<Workspace> {
    let workspace = Workspace::at(unify_path(root));
    fs::create_dir_all(workspace.backups_dir())?;
    fs::create_dir_all(workspace.undo_dir())?;
    Ok(workspace)
}

/// Detect a workspace root by walking upward from the starting path.
/// If no workspace is found, returns the starting directory without creating one.
pub fn detect_workspace_root(start: &Path) -> HelperResult<PathBuf> {
    let starting_dir = starting_dir(start);
    Ok(find_existing_root(&starting_dir).unwrap_or(starting_dir))
}

/// The directory a path belongs to: itself if it is one, else its parent
fn starting_dir(start: &Path) -> PathBuf {
    let unified = unify_path(start);
    if unified.is_dir() {
        unified
    } else {
        unified
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn find_existing_root(starting_dir: &Path) -> Option<PathBuf> {
    let mut current = starting_dir.to_path_buf();
    for _ in 0..MAX_UPWARD_STEPS {
        if current.join(WORKSPACE_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_detection() -> HelperResult<()> {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        let nested = root.join("a").join("b").join("c");
        fs::create_dir_all(&nested)?;

        // No workspace exists yet, should use nested as root
        let detected = detect_workspace_root(&nested)?;
        assert_eq!(unify_path(&nested), detected);

        // Create workspace at root/a
        let workspace_root = root.join("a");
        init_workspace(&workspace_root)?;

        let detected = detect_workspace_root(&nested)?;
        assert_eq!(unify_path(&workspace_root), detected);

        // A file path resolves through its parent directory
        let file = nested.join("file.txt");
        fs::write(&file, "x")?;
        assert_eq!(detect_workspace_root(&file)?, unify_path(&workspace_root));

        Ok(())
    }

    #[test]
    fn test_workspace_initialization() -> HelperResult<()> {
        let temp = TempDir::new().unwrap();
        let workspace = init_workspace(temp.path())?;

        assert_eq!(workspace.root(), unify_path(temp.path()));
        assert!(workspace.backups_dir().is_dir());
        assert!(workspace.undo_dir().is_dir());
        assert_eq!(Workspace::detect(temp.path())?, workspace);

        Ok(())
    }

    #[test]
    fn test_detect_within_prefers_project_root() -> HelperResult<()> {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let file = project.join("sub").join("x.txt");
        fs::create_dir_all(file.parent().unwrap())?;
        fs::write(&file, "x")?;

        let workspace = Workspace::detect_within(&file, &project)?;
        assert_eq!(workspace.root(), unify_path(&project));

        // Paths outside the project keep their own directory
        let outside = temp.path().join("other");
        fs::create_dir_all(&outside)?;
        let workspace = Workspace::detect_within(&outside, &project)?;
        assert_eq!(workspace.root(), unify_path(&outside));

        // An existing workspace further down still wins
        init_workspace(&project.join("sub"))?;
        let workspace = Workspace::detect_within(&file, &project)?;
        assert_eq!(workspace.root(), unify_path(&project.join("sub")));

        Ok(())
    }
}
