use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use projhelper::{
    errors::HelperResult,
    replace::{list_undo_operations, undo_by_id, ReplacementConfig, ReplacementPattern, ReplacementSet},
    search::PatternDefinition,
    workspace::{init_workspace, Workspace},
    ScanFilter, SearchScope, TextCodec,
};

/// Helper function to create a test file with content
fn create_test_file(root: &std::path::Path, name: &str, content: &str) -> HelperResult<PathBuf> {
    let path = root.join(name);
    fs::write(&path, content)?;
    Ok(path)
}

#[test]
fn test_workspace_move() -> HelperResult<()> {
    // 1. Create initial workspace
    let temp = TempDir::new().unwrap();
    let initial_root = temp.path().join("project");
    fs::create_dir(&initial_root)?;
    let workspace = init_workspace(&initial_root)?;

    // 2. Replace with backups enabled
    create_test_file(workspace.root(), "test.txt", "original content")?;
    let set = ReplacementSet::new(
        ReplacementConfig::new(ReplacementPattern::new(
            PatternDefinition::literal("original"),
            "modified",
        )),
        TextCodec::default(),
    )?;
    let report = set.apply(
        &SearchScope::Recursive(workspace.root().to_path_buf()),
        &ScanFilter::default(),
    )?;
    let id = report.undo_id.expect("undo record");

    // 3. Move the whole workspace
    let moved_root = temp.path().join("moved");
    fs::rename(&initial_root, &moved_root)?;
    let moved = Workspace::detect(&moved_root)?;
    assert_eq!(list_undo_operations(&moved)?.len(), 1);

    // 4. Undo resolves paths relative to the new root
    undo_by_id(id, &moved)?;
    assert_eq!(
        fs::read_to_string(moved_root.join("test.txt"))?,
        "original content"
    );
    assert!(list_undo_operations(&moved)?.is_empty());

    Ok(())
}

#[test]
fn test_undo_with_missing_backup_changes_nothing() -> HelperResult<()> {
    let temp = TempDir::new().unwrap();
    let workspace = init_workspace(temp.path())?;
    let file = create_test_file(workspace.root(), "a.txt", "alpha")?;

    let set = ReplacementSet::new(
        ReplacementConfig::new(ReplacementPattern::new(
            PatternDefinition::literal("alpha"),
            "beta",
        )),
        TextCodec::default(),
    )?;
    let report = set.apply(&SearchScope::File(file.clone()), &ScanFilter::default())?;
    let id = report.undo_id.expect("undo record");

    fs::remove_dir_all(workspace.backups_dir().join(id.to_string()))?;

    assert!(undo_by_id(id, &workspace).is_err());
    assert_eq!(fs::read_to_string(&file)?, "beta");
    Ok(())
}
