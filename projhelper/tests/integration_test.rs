use anyhow::Result;
use projhelper::{
    search, HelperConfig, HelperError, PatternDefinition, ScanFilter, SearchQuery, SearchScope,
    Searcher, TextCodec,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// test1.py, test2.py, test3.txt and subdir/test4.py
fn create_sample_tree() -> Result<TempDir> {
    let dir = tempdir()?;
    fs::write(dir.path().join("test1.py"), "print('Hello World')\n")?;
    fs::write(dir.path().join("test2.py"), "import os\n")?;
    fs::write(dir.path().join("test3.txt"), "Just a text file\n")?;
    fs::create_dir(dir.path().join("subdir"))?;
    fs::write(
        dir.path().join("subdir").join("test4.py"),
        "print(os.getcwd())\n",
    )?;
    Ok(dir)
}

fn relative_paths(root: &Path, paths: Vec<&PathBuf>) -> Vec<String> {
    let mut names: Vec<String> = paths
        .into_iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap_or(p)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

#[test]
fn test_search_sample_tree() -> Result<()> {
    let dir = create_sample_tree()?;

    let output = search(
        &HelperConfig::default(),
        PatternDefinition::literal("print"),
        SearchScope::Recursive(dir.path().to_path_buf()),
    )?;

    assert_eq!(output.files_searched, 4);
    assert_eq!(output.total_matches, 2);
    assert_eq!(
        relative_paths(dir.path(), output.matched_paths().collect()),
        vec!["subdir/test4.py", "test1.py"]
    );
    Ok(())
}

#[test]
fn test_directory_scope_skips_subdirectories() -> Result<()> {
    let dir = create_sample_tree()?;

    let output = search(
        &HelperConfig::default(),
        PatternDefinition::literal("print"),
        SearchScope::Directory(dir.path().to_path_buf()),
    )?;

    assert_eq!(output.files_searched, 3);
    assert_eq!(
        relative_paths(dir.path(), output.matched_paths().collect()),
        vec!["test1.py"]
    );
    Ok(())
}

#[test]
fn test_match_columns() -> Result<()> {
    let dir = tempdir()?;
    let file = dir.path().join("foo.txt");
    fs::write(&file, "foo bar foo\n")?;

    let searcher = Searcher::new(
        SearchQuery::new(PatternDefinition::literal("foo"), SearchScope::File(file)),
        ScanFilter::default(),
        TextCodec::default(),
    )?;
    let found: Vec<_> = searcher.matches()?.collect::<Result<_, _>>()?;

    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|m| m.matched.line_number == 1));
    assert_eq!(
        found
            .iter()
            .map(|m| (m.matched.start, m.matched.end))
            .collect::<Vec<_>>(),
        vec![(0, 3), (8, 11)]
    );
    Ok(())
}

#[test]
fn test_absent_pattern_yields_nothing() -> Result<()> {
    let dir = create_sample_tree()?;

    for pattern in [
        PatternDefinition::literal("definitely_absent"),
        PatternDefinition::regex(r"zz\d{5}"),
        PatternDefinition::wildcard("nope*here"),
    ] {
        let output = search(
            &HelperConfig::default(),
            pattern,
            SearchScope::Recursive(dir.path().to_path_buf()),
        )?;
        assert_eq!(output.total_matches, 0);
        assert!(output.file_results.is_empty());
    }
    Ok(())
}

#[test]
fn test_extension_and_ignore_filters() -> Result<()> {
    let dir = create_sample_tree()?;

    let config = HelperConfig {
        file_extensions: Some(vec!["txt".to_string()]),
        ..HelperConfig::default()
    };
    let output = search(
        &config,
        PatternDefinition::regex(r"\w+"),
        SearchScope::Recursive(dir.path().to_path_buf()),
    )?;
    assert_eq!(output.files_searched, 1);

    let config = HelperConfig {
        ignore_patterns: vec!["subdir/**".to_string()],
        ..HelperConfig::default()
    };
    let output = search(
        &config,
        PatternDefinition::literal("print"),
        SearchScope::Recursive(dir.path().to_path_buf()),
    )?;
    assert_eq!(
        relative_paths(dir.path(), output.matched_paths().collect()),
        vec!["test1.py"]
    );
    Ok(())
}

#[test]
fn test_context_lines() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("ctx.txt"), "one\ntwo\nTODO three\nfour\nfive\n")?;

    let config = HelperConfig {
        context_before: 1,
        context_after: 2,
        ..HelperConfig::default()
    };
    let output = search(
        &config,
        PatternDefinition::literal("TODO"),
        SearchScope::Recursive(dir.path().to_path_buf()),
    )?;

    let found = &output.file_results[0].matches[0];
    assert_eq!(found.line_number, 3);
    assert_eq!(found.context_before, vec![(2, "two".to_string())]);
    assert_eq!(
        found.context_after,
        vec![(4, "four".to_string()), (5, "five".to_string())]
    );
    Ok(())
}

#[test]
fn test_undecodable_file_is_reported_not_fatal() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("good.txt"), "needle\n")?;
    fs::write(dir.path().join("latin1.txt"), b"needle caf\xE9\n")?;

    let output = search(
        &HelperConfig::default(),
        PatternDefinition::literal("needle"),
        SearchScope::Recursive(dir.path().to_path_buf()),
    )?;
    assert_eq!(output.total_matches, 1);
    assert_eq!(output.failures.len(), 1);

    let config = HelperConfig {
        fallback_encoding: Some("windows-1252".to_string()),
        ..HelperConfig::default()
    };
    let output = search(
        &config,
        PatternDefinition::literal("café"),
        SearchScope::Recursive(dir.path().to_path_buf()),
    )?;
    assert_eq!(output.total_matches, 1);
    assert!(output.failures.is_empty());
    Ok(())
}

#[test]
fn test_missing_root_is_an_error() {
    let result = search(
        &HelperConfig::default(),
        PatternDefinition::literal("x"),
        SearchScope::Recursive(PathBuf::from("/no/such/projhelper/root")),
    );
    assert!(matches!(result, Err(HelperError::FileNotFound(_))));
}
