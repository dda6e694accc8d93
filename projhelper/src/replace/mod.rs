use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::HelperConfig;
use crate::encoding::{read_text, DecodedText, TextCodec};
use crate::errors::{unify_path, HelperError, HelperResult};
use crate::scanner::{FileScanner, ScanFilter, SearchScope};
use crate::search::matcher::{PatternDefinition, PatternMatcher};
use crate::search::processor::split_lines;
use crate::workspace::Workspace;

mod undo_info;
pub use undo_info::{UndoFileReference, UndoInfo};

/// A pattern and its replacement text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementPattern {
    /// The pattern definition
    pub definition: PatternDefinition,
    /// The text to replace matches with
    pub replacement_text: String,
}

impl ReplacementPattern {
    pub fn new(definition: PatternDefinition, replacement_text: impl Into<String>) -> Self {
        Self {
            definition,
            replacement_text: replacement_text.into(),
        }
    }

    /// Removes every match
    pub fn deletion(definition: PatternDefinition) -> Self {
        Self::new(definition, String::new())
    }

    pub fn is_deletion(&self) -> bool {
        self.replacement_text.is_empty()
    }

    /// Human readable summary, used for undo records and history
    pub fn describe(&self) -> String {
        if self.is_deletion() {
            format!("Delete '{}'", self.definition.text)
        } else {
            format!(
                "Replace '{}' with '{}'",
                self.definition.text, self.replacement_text
            )
        }
    }
}

/// Configuration for replacement operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementConfig {
    /// The pattern and its replacement
    pub pattern: ReplacementPattern,

    /// Whether to create backups of modified files
    pub backup_enabled: bool,

    /// Whether to only show what would be changed without modifying files
    pub dry_run: bool,

    /// Whether to keep file permissions on rewritten files
    pub preserve_metadata: bool,
}

impl ReplacementConfig {
    pub fn new(pattern: ReplacementPattern) -> Self {
        Self {
            pattern,
            backup_enabled: true,
            dry_run: false,
            preserve_metadata: true,
        }
    }

    /// Takes the backup setting from the shared configuration
    pub fn from_helper_config(pattern: ReplacementPattern, config: &HelperConfig) -> Self {
        Self {
            backup_enabled: config.backup_enabled,
            ..Self::new(pattern)
        }
    }

    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }

    pub fn backup_enabled(mut self, yes: bool) -> Self {
        self.backup_enabled = yes;
        self
    }
}

/// Lines a replacement changes in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewResult {
    pub file_path: PathBuf,
    /// Removed lines with their 1-based numbers in the original file
    pub original_lines: Vec<(usize, String)>,
    /// Added lines with their 1-based numbers in the new file
    pub new_lines: Vec<(usize, String)>,
}

impl PreviewResult {
    fn between(file_path: &Path, old: &str, new: &str) -> Self {
        let mut original_lines = Vec::new();
        let mut new_lines = Vec::new();

        let diff = TextDiff::from_lines(old, new);
        for change in diff.iter_all_changes() {
            let line = change.value().trim_end_matches(['\r', '\n']).to_string();
            match change.tag() {
                ChangeTag::Delete => {
                    if let Some(index) = change.old_index() {
                        original_lines.push((index + 1, line));
                    }
                }
                ChangeTag::Insert => {
                    if let Some(index) = change.new_index() {
                        new_lines.push((index + 1, line));
                    }
                }
                ChangeTag::Equal => {}
            }
        }

        Self {
            file_path: file_path.to_path_buf(),
            original_lines,
            new_lines,
        }
    }
}

/// The new contents computed for a single file
#[derive(Debug)]
pub struct FileReplacementPlan {
    pub file_path: PathBuf,
    original: DecodedText,
    new_text: String,
    /// Number of occurrences replaced
    pub replacements: usize,
}

impl FileReplacementPlan {
    /// Reads the file and replaces every match line by line, keeping line terminators
    pub fn build(
        file_path: &Path,
        matcher: &PatternMatcher,
        replacement: &str,
        codec: &TextCodec,
    ) -> HelperResult<Self> {
        let original = read_text(file_path, codec)?;

        let mut new_text = String::with_capacity(original.text.len());
        let mut replacements = 0;
        for (line, terminator) in split_lines(&original.text) {
            let (replaced, count) = matcher.replace_all(line, replacement);
            replacements += count;
            new_text.push_str(&replaced);
            new_text.push_str(terminator);
        }

        Ok(Self {
            file_path: file_path.to_path_buf(),
            original,
            new_text,
            replacements,
        })
    }

    /// True when writing the plan would not change the file. A replacement that reproduces
    /// the matched text (`foo` with `foo`) counts as unchanged and is reported as zero
    /// replacements.
    pub fn is_unchanged(&self) -> bool {
        self.replacements == 0 || self.new_text == self.original.text
    }

    pub fn preview(&self) -> PreviewResult {
        PreviewResult::between(&self.file_path, &self.original.text, &self.new_text)
    }

    /// Writes the new contents, returning the backup path if one was made.
    ///
    /// The text is encoded before anything is touched, so an unmappable replacement leaves
    /// neither a backup nor a modified file behind.
    pub fn apply(
        &self,
        codec: &TextCodec,
        config: &ReplacementConfig,
        backup: Option<&BackupTarget>,
    ) -> HelperResult<Option<PathBuf>> {
        let bytes = codec.encode(&self.original, &self.new_text, &self.file_path)?;

        let backup_path = match backup {
            Some(target) if config.backup_enabled => Some(self.create_backup(target)?),
            _ => None,
        };

        atomic_write(&self.file_path, &bytes, config.preserve_metadata)?;
        debug!(
            "Rewrote {} ({} replacements)",
            self.file_path.display(),
            self.replacements
        );
        Ok(backup_path)
    }

    /// Copies the file to `backups/<stamp>/<path relative to the workspace>`
    fn create_backup(&self, target: &BackupTarget) -> HelperResult<PathBuf> {
        let file_path = unify_path(&self.file_path);
        let relative: PathBuf = file_path
            .strip_prefix(target.workspace.root())
            .unwrap_or(&file_path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();

        let backup_path = target.run_dir().join(relative);
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&self.file_path, &backup_path)
            .map_err(|e| HelperError::from_io(&self.file_path, e))?;
        debug!("Backed up {} to {}", self.file_path.display(), backup_path.display());
        Ok(backup_path)
    }
}

/// Where backups of one run go
#[derive(Debug, Clone)]
pub struct BackupTarget {
    pub workspace: Workspace,
    /// Names the run's backup directory; also the undo id
    pub stamp: u64,
}

impl BackupTarget {
    /// A target with an id no earlier run in `workspace` has used
    pub fn next(workspace: Workspace) -> Self {
        let mut stamp = now_millis();
        while UndoInfo::record_path(&workspace.undo_dir(), stamp).exists()
            || workspace.backups_dir().join(stamp.to_string()).exists()
        {
            stamp += 1;
        }
        Self { workspace, stamp }
    }

    /// Directory holding this run's backups
    pub fn run_dir(&self) -> PathBuf {
        self.workspace.backups_dir().join(self.stamp.to_string())
    }
}

/// Outcome of replacing in one file
#[derive(Debug)]
pub struct FileReplacement {
    pub path: PathBuf,
    /// Number of occurrences replaced, or why the file was skipped. Zero when the replacement
    /// left the text as it was.
    pub outcome: HelperResult<usize>,
    pub preview: Option<PreviewResult>,
    pub backup: Option<PathBuf>,
}

impl FileReplacement {
    fn failed(path: &Path, error: HelperError) -> Self {
        Self {
            path: path.to_path_buf(),
            outcome: Err(error),
            preview: None,
            backup: None,
        }
    }

    /// Occurrences replaced, zero for a failed file
    pub fn replaced(&self) -> usize {
        self.outcome.as_ref().map_or(0, |n| *n)
    }

    pub fn is_err(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Summary of one replacement run
#[derive(Debug, Default)]
pub struct ReplacementReport {
    /// Files that changed or failed, in scan order. Untouched files are not listed.
    pub files: Vec<FileReplacement>,
    pub files_scanned: usize,
    pub dry_run: bool,
    /// Id of the undo record written for this run
    pub undo_id: Option<u64>,
    /// Why the undo record could not be written. The files were still changed.
    pub undo_error: Option<HelperError>,
}

impl ReplacementReport {
    pub fn total_replacements(&self) -> usize {
        self.files.iter().map(FileReplacement::replaced).sum()
    }

    /// Files that were (or in a dry run would be) rewritten
    pub fn changed_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.files
            .iter()
            .filter(|f| f.replaced() > 0)
            .map(|f| &f.path)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReplacement> {
        self.files.iter().filter(|f| f.is_err())
    }
}

/// Applies one replacement pattern to a scope, one file at a time
#[derive(Debug)]
pub struct ReplacementSet {
    config: ReplacementConfig,
    matcher: PatternMatcher,
    codec: TextCodec,
    show_progress: bool,
    project_root: Option<PathBuf>,
}

impl ReplacementSet {
    /// Compiles the pattern and checks the replacement before any file is read
    pub fn new(config: ReplacementConfig, codec: TextCodec) -> HelperResult<Self> {
        let matcher = PatternMatcher::new(config.pattern.definition.clone())?;
        matcher.validate_replacement(&config.pattern.replacement_text)?;
        Ok(Self {
            config,
            matcher,
            codec,
            show_progress: false,
            project_root: None,
        })
    }

    /// Draws a progress bar on stderr while applying
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.show_progress = yes;
        self
    }

    /// Keeps backups and undo records in `root` unless a workspace already exists above the
    /// files being changed
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn config(&self) -> &ReplacementConfig {
        &self.config
    }

    /// Replaces in every file of `scope`. Per-file failures are recorded in the report;
    /// only a missing scope root fails the whole run.
    pub fn apply(&self, scope: &SearchScope, filter: &ScanFilter) -> HelperResult<ReplacementReport> {
        let files = FileScanner::new(scope.clone(), filter.clone()).scan()?;
        info!(
            "{} in {} ({} files{})",
            self.config.pattern.describe(),
            scope.root().display(),
            files.len(),
            if self.config.dry_run { ", dry run" } else { "" }
        );

        let progress = self.progress_bar(files.len());
        let target = BackupTarget::next(self.workspace_for(scope.root())?);

        let mut report = ReplacementReport {
            files_scanned: files.len(),
            dry_run: self.config.dry_run,
            ..ReplacementReport::default()
        };
        for path in &files {
            let result = self.replace_in_file(path, Some(&target));
            if let Err(e) = &result.outcome {
                warn!("Skipping {}: {}", path.display(), e);
            }
            if result.is_err() || result.replaced() > 0 {
                report.files.push(result);
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        if !self.config.dry_run {
            match self.save_undo_info(&target, &report.files) {
                Ok(id) => report.undo_id = id,
                Err(e) => {
                    warn!("Could not save undo record {}: {}", target.stamp, e);
                    report.undo_error = Some(e);
                }
            }
        }

        info!(
            "Replaced {} occurrences in {} files ({} failed)",
            report.total_replacements(),
            report.changed_files().count(),
            report.failures().count()
        );
        Ok(report)
    }

    /// Replaces in a single file. Never fails; errors end up in the outcome.
    pub fn replace_in_file(&self, path: &Path, backup: Option<&BackupTarget>) -> FileReplacement {
        let plan = match FileReplacementPlan::build(
            path,
            &self.matcher,
            &self.config.pattern.replacement_text,
            &self.codec,
        ) {
            Ok(plan) => plan,
            Err(e) => return FileReplacement::failed(path, e),
        };

        if plan.is_unchanged() {
            return FileReplacement {
                path: path.to_path_buf(),
                outcome: Ok(0),
                preview: None,
                backup: None,
            };
        }

        let preview = Some(plan.preview());
        if self.config.dry_run {
            // Still surface encoding problems a real run would hit
            if let Err(e) = self.codec.encode(&plan.original, &plan.new_text, path) {
                return FileReplacement::failed(path, e);
            }
            return FileReplacement {
                path: path.to_path_buf(),
                outcome: Ok(plan.replacements),
                preview,
                backup: None,
            };
        }

        match plan.apply(&self.codec, &self.config, backup) {
            Ok(backup) => FileReplacement {
                path: path.to_path_buf(),
                outcome: Ok(plan.replacements),
                preview,
                backup,
            },
            Err(e) => FileReplacement::failed(path, e),
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files")
        {
            progress.set_style(style.progress_chars("=>-"));
        }
        progress
    }

    fn workspace_for(&self, path: &Path) -> HelperResult<Workspace> {
        match &self.project_root {
            Some(root) => Workspace::detect_within(path, root),
            None => Workspace::detect(path),
        }
    }

    /// Writes the undo record for the backups in `files`; `None` when nothing was backed up
    fn save_undo_info(
        &self,
        target: &BackupTarget,
        files: &[FileReplacement],
    ) -> HelperResult<Option<u64>> {
        let backups: Vec<(&PathBuf, &PathBuf)> = files
            .iter()
            .filter_map(|f| f.backup.as_ref().map(|b| (&f.path, b)))
            .collect();
        if backups.is_empty() {
            return Ok(None);
        }

        let root = target.workspace.root();
        let info = UndoInfo {
            id: target.stamp,
            description: self.config.pattern.describe(),
            backups: backups
                .iter()
                .map(|(original, backup)| {
                    (
                        UndoFileReference::new(original, root),
                        UndoFileReference::new(backup, root),
                    )
                })
                .collect(),
            total_size: backups
                .iter()
                .map(|(_, b)| fs::metadata(b).map(|m| m.len()).unwrap_or(0))
                .sum(),
            file_count: backups.len(),
        };

        let path = info.save(&target.workspace.undo_dir())?;
        info!("Saved undo record {}", path.display());
        Ok(Some(target.stamp))
    }
}

/// Lists undo records of a workspace, oldest first
pub fn list_undo_operations(workspace: &Workspace) -> HelperResult<Vec<(UndoInfo, PathBuf)>> {
    let undo_dir = workspace.undo_dir();
    if !undo_dir.exists() {
        return Ok(Vec::new());
    }

    let mut operations = Vec::new();
    for entry in fs::read_dir(&undo_dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<UndoInfo>(&content) {
                Ok(info) => operations.push((info, path)),
                Err(e) => warn!("Ignoring unreadable undo record {}: {}", path.display(), e),
            }
        }
    }

    operations.sort_by_key(|(info, _)| info.id);
    Ok(operations)
}

/// Restores every file of an undo record, then deletes its backups and the record
pub fn undo_by_id(id: u64, workspace: &Workspace) -> HelperResult<UndoInfo> {
    let undo_dir = workspace.undo_dir();
    let info = UndoInfo::load(&undo_dir, id)?;
    let root = workspace.root();

    let mut restores = Vec::with_capacity(info.backups.len());
    for (original, backup) in &info.backups {
        let backup_path = backup.resolve(root);
        if !backup_path.exists() {
            return Err(HelperError::undo_error(format!(
                "Backup file not found: {}",
                backup_path.display()
            )));
        }
        restores.push((original.resolve(root), backup_path));
    }

    for (target, backup_path) in &restores {
        let content = fs::read(backup_path).map_err(|e| HelperError::from_io(backup_path, e))?;
        atomic_write(target, &content, true)?;
        debug!("Restored {}", target.display());
    }

    let backups_dir = workspace.backups_dir();
    for (_, backup_path) in &restores {
        if let Err(e) = fs::remove_file(backup_path) {
            warn!("Could not remove backup {}: {}", backup_path.display(), e);
        }
        prune_empty_dirs(backup_path, &backups_dir);
    }
    fs::remove_file(UndoInfo::record_path(&undo_dir, id))?;

    info!("Undid operation {} ({} files)", id, restores.len());
    Ok(info)
}

/// Replaces `pattern` in one file with the settings of `config`. A backup made here gets its
/// own undo record, like a run over a scope.
pub fn replace_in_file(
    config: &HelperConfig,
    pattern: ReplacementPattern,
    path: &Path,
) -> HelperResult<FileReplacement> {
    let set = ReplacementSet::new(
        ReplacementConfig::from_helper_config(pattern, config),
        config.codec()?,
    )?
    .with_project_root(&config.root_path);
    let target = BackupTarget::next(set.workspace_for(path)?);

    let result = set.replace_in_file(path, Some(&target));
    if let Err(e) = set.save_undo_info(&target, std::slice::from_ref(&result)) {
        warn!("Could not save undo record {}: {}", target.stamp, e);
    }
    Ok(result)
}

/// Replaces `pattern` in every file of `scope` with the settings of `config`
pub fn replace_in_scope(
    config: &HelperConfig,
    pattern: ReplacementPattern,
    scope: &SearchScope,
) -> HelperResult<ReplacementReport> {
    ReplacementSet::new(
        ReplacementConfig::from_helper_config(pattern, config),
        config.codec()?,
    )?
    .with_project_root(&config.root_path)
    .apply(scope, &config.scan_filter())
}

/// Writes through a temporary file in the same directory, so the target is either the old or
/// the new contents.
pub(crate) fn atomic_write(path: &Path, contents: &[u8], keep_permissions: bool) -> HelperResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let permissions = if keep_permissions {
        fs::metadata(path).ok().map(|m| m.permissions())
    } else {
        None
    };

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| HelperError::from_io(path, e))?;
    temp.write_all(contents)
        .map_err(|e| HelperError::from_io(path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| HelperError::from_io(path, e))?;
    if let Some(permissions) = permissions {
        fs::set_permissions(temp.path(), permissions).map_err(|e| HelperError::from_io(path, e))?;
    }
    temp.persist(path)
        .map_err(|e| HelperError::from_io(path, e.error))?;
    Ok(())
}

/// Removes the directories between `path` and `stop` that became empty
fn prune_empty_dirs(path: &Path, stop: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == stop || !current.starts_with(stop) || fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
