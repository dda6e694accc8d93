use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::encoding::{read_text, TextCodec};
use crate::errors::{HelperError, HelperResult};
use crate::scanner::{FileScanner, ScanFilter, SearchScope};

/// What kind of problem a file has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    /// The file could not be read
    Io,
    /// The bytes are not valid in any configured encoding
    Encoding,
    /// JSON syntax error
    Json,
    /// YAML syntax error
    Yaml,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::Io => "io",
            IssueKind::Encoding => "encoding",
            IssueKind::Json => "json",
            IssueKind::Yaml => "yaml",
        };
        f.write_str(name)
    }
}

/// One problem found in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckIssue {
    pub path: PathBuf,
    pub kind: IssueKind,
    /// 1-based position, when the parser reports one
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl fmt::Display for CheckIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        write!(f, ": [{}] {}", self.kind, self.message)
    }
}

/// Issues found in a scope
#[derive(Debug, Default, Serialize)]
pub struct CheckReport {
    pub issues: Vec<CheckIssue>,
    pub files_checked: usize,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks a single file, returning its problem if it has one
pub fn check_file(path: &Path, codec: &TextCodec) -> Option<CheckIssue> {
    let decoded = match read_text(path, codec) {
        Ok(decoded) if decoded.lossy => {
            return Some(issue(path, IssueKind::Encoding, "invalid byte sequence".to_string()))
        }
        Ok(decoded) => decoded,
        Err(e @ HelperError::EncodingError { .. }) => {
            return Some(issue(path, IssueKind::Encoding, e.to_string()))
        }
        Err(e) => return Some(issue(path, IssueKind::Io, e.to_string())),
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => check_json(path, &decoded.text),
        Some("yaml" | "yml") => check_yaml(path, &decoded.text),
        _ => None,
    }
}

/// Checks every file of `scope`
pub fn check_scope(
    scope: &SearchScope,
    filter: &ScanFilter,
    codec: &TextCodec,
) -> HelperResult<CheckReport> {
    info!("Checking files in {}", scope.root().display());

    let mut report = CheckReport::default();
    for path in FileScanner::new(scope.clone(), filter.clone()).files()? {
        report.files_checked += 1;
        if let Some(found) = check_file(&path, codec) {
            debug!("{}", found);
            report.issues.push(found);
        }
    }

    info!(
        "Checked {} files, {} problems",
        report.files_checked,
        report.issues.len()
    );
    Ok(report)
}

fn check_json(path: &Path, text: &str) -> Option<CheckIssue> {
    let err = serde_json::from_str::<serde_json::Value>(text).err()?;
    Some(CheckIssue {
        line: Some(err.line()).filter(|l| *l > 0),
        column: Some(err.column()).filter(|c| *c > 0),
        ..issue(path, IssueKind::Json, err.to_string())
    })
}

fn check_yaml(path: &Path, text: &str) -> Option<CheckIssue> {
    for document in serde_yaml::Deserializer::from_str(text) {
        if let Err(err) = serde_yaml::Value::deserialize(document) {
            let location = err.location();
            return Some(CheckIssue {
                line: location.as_ref().map(|l| l.line()),
                column: location.as_ref().map(|l| l.column()),
                ..issue(path, IssueKind::Yaml, err.to_string())
            });
        }
    }
    None
}

fn issue(path: &Path, kind: IssueKind, message: String) -> CheckIssue {
    CheckIssue {
        path: path.to_path_buf(),
        kind,
        line: None,
        column: None,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_valid_files_have_no_issues() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"key": [1, 2, 3]}"#).unwrap();
        fs::write(dir.path().join("b.yaml"), "key: value\n---\nother: 1\n").unwrap();
        fs::write(dir.path().join("c.txt"), "plain text\n").unwrap();

        let report = check_scope(
            &SearchScope::Recursive(dir.path().to_path_buf()),
            &ScanFilter::default(),
            &TextCodec::default(),
        )
        .unwrap();
        assert_eq!(report.files_checked, 3);
        assert!(report.is_clean());
    }

    #[test]
    fn test_json_syntax_error_has_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\n  \"key\": ,\n}").unwrap();

        let found = check_file(&path, &TextCodec::default()).unwrap();
        assert_eq!(found.kind, IssueKind::Json);
        assert_eq!(found.line, Some(2));
        assert!(found.to_string().contains("bad.json:2:"));
    }

    #[test]
    fn test_yaml_syntax_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "key: [unclosed\n").unwrap();

        let found = check_file(&path, &TextCodec::default()).unwrap();
        assert_eq!(found.kind, IssueKind::Yaml);
    }

    #[test]
    fn test_undecodable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        fs::write(&path, b"caf\xE9\n").unwrap();

        let found = check_file(&path, &TextCodec::default()).unwrap();
        assert_eq!(found.kind, IssueKind::Encoding);

        let codec =
            TextCodec::new(crate::encoding::EncodingMode::FailFast, Some("latin1")).unwrap();
        assert!(check_file(&path, &codec).is_none());
    }
}
