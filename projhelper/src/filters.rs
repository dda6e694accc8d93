/// File filtering used by the scanner.
///
/// These are plain functions over paths rather than a trait: the scanner applies them in a
/// fixed order (tool directories, binary extensions, extension allow-list, ignore globs) and no
/// caller needs to swap in a different policy.
use glob::Pattern;
use std::ffi::OsStr;
use std::path::Path;

/// Directories that are never scanned
const ALWAYS_IGNORED_DIRS: &[&str] = &[".git", ".projhelper"];

/// Checks if a file should be included based on its extension
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| {
                exts.iter()
                    .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
            }),
    }
}

/// Checks if a path lies inside a directory the tool never touches
pub fn in_ignored_dir(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| ALWAYS_IGNORED_DIRS.contains(&name))
    })
}

/// Checks if a file should be ignored based on ignore patterns.
///
/// `path` should be relative to the scan root so patterns like `target/**` behave as expected.
pub fn should_ignore(path: &Path, ignore_patterns: &[String]) -> bool {
    if in_ignored_dir(path) {
        return true;
    }

    let normalized = path.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|pattern| {
        Pattern::new(pattern)
            .map(|p| p.matches(&normalized))
            .unwrap_or(false)
    })
}

/// Checks if a file is likely to be binary
pub fn is_likely_binary(path: &Path) -> bool {
    // Common binary file extensions
    const BINARY_EXTENSIONS: &[&str] = &[
        "exe", "dll", "so", "dylib", "bin", "obj", "o", "a", "lib", "class", "jar", "war", "ear",
        "pyc", "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "doc", "docx", "xls",
        "xlsx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "sqlite", "db",
    ];

    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|bin_ext| bin_ext.eq_ignore_ascii_case(ext))
        })
}

/// Determines if a file should be included in the scan
pub fn should_include_file(
    path: &Path,
    extensions: &Option<Vec<String>>,
    ignore_patterns: &[String],
) -> bool {
    !is_likely_binary(path)
        && has_valid_extension(path, extensions)
        && !should_ignore(path, ignore_patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_valid_extension() {
        let extensions = Some(vec!["py".to_string()]);
        assert!(has_valid_extension(Path::new("test.py"), &extensions));
        assert!(!has_valid_extension(Path::new("test.txt"), &extensions));
        assert!(has_valid_extension(Path::new("test.PY"), &extensions));
        assert!(!has_valid_extension(Path::new("Makefile"), &extensions));
        assert!(has_valid_extension(Path::new("test.txt"), &None));

        let dotted = Some(vec![".rs".to_string()]);
        assert!(has_valid_extension(Path::new("main.rs"), &dotted));
    }

    #[test]
    fn test_should_ignore() {
        let ignore_patterns = vec![
            "**/test_[0-4].txt".to_string(),
            "target/**/*.rs".to_string(),
            "**/*.tmp".to_string(),
        ];

        assert!(should_ignore(Path::new("test_0.txt"), &ignore_patterns));
        assert!(should_ignore(Path::new("dir/test_2.txt"), &ignore_patterns));
        assert!(should_ignore(
            Path::new("target/debug/main.rs"),
            &ignore_patterns
        ));
        assert!(should_ignore(Path::new("src/temp.tmp"), &ignore_patterns));
        assert!(should_ignore(Path::new(".git/config"), &[]));
        assert!(should_ignore(
            Path::new(".projhelper/backups/1/a.txt"),
            &[]
        ));

        assert!(!should_ignore(Path::new("test_5.txt"), &ignore_patterns));
        assert!(!should_ignore(Path::new("src/main.rs"), &ignore_patterns));
        assert!(!should_ignore(Path::new(".gitignore"), &ignore_patterns));
        assert!(!should_ignore(Path::new(".git2/config"), &ignore_patterns));
    }

    #[test]
    fn test_is_likely_binary() {
        assert!(is_likely_binary(Path::new("test.exe")));
        assert!(is_likely_binary(Path::new("test.PNG")));
        assert!(!is_likely_binary(Path::new("test.py")));
        assert!(!is_likely_binary(Path::new("README")));
    }

    #[test]
    fn test_should_include_file() {
        let extensions = Some(vec!["rs".to_string()]);
        let ignore_patterns = vec!["target/**/*.rs".to_string()];

        assert!(should_include_file(
            Path::new("src/main.rs"),
            &extensions,
            &ignore_patterns
        ));
        assert!(!should_include_file(
            Path::new("src/main.py"),
            &extensions,
            &ignore_patterns
        ));
        assert!(!should_include_file(
            Path::new("target/debug/main.rs"),
            &extensions,
            &ignore_patterns
        ));
        assert!(!should_include_file(
            Path::new("src/test.exe"),
            &None,
            &ignore_patterns
        ));
    }
}
