use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use projhelper::{
    check_scope, list_undo_operations, undo_by_id, CliOverrides, EncodingMode, HelperConfig,
    PatternDefinition, PatternKind, ReplacementConfig, ReplacementPattern, ReplacementReport,
    ReplacementSet, SearchQuery, Searcher, Workspace,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::debug;

use crate::diff_utils::print_preview;

/// How the pattern text is interpreted
#[derive(Args, Debug, Clone, Default)]
pub struct PatternArgs {
    /// Treat the pattern as a regular expression
    #[arg(short = 'r', long, conflicts_with = "wildcard")]
    pub regex: bool,

    /// Treat `*` and `?` in the pattern as wildcards
    #[arg(short = 'w', long)]
    pub wildcard: bool,

    /// Match case-insensitively
    #[arg(short = 'i', long)]
    pub ignore_case: bool,
}

impl PatternArgs {
    pub fn definition(&self, text: &str) -> PatternDefinition {
        let kind = if self.regex {
            PatternKind::Regex
        } else if self.wildcard {
            PatternKind::Wildcard
        } else {
            PatternKind::Literal
        };
        PatternDefinition::new(text, kind).case_insensitive(self.ignore_case)
    }
}

/// Which files an operation looks at
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Only look at the top level of a directory
    #[arg(long)]
    pub no_recursive: bool,

    /// File extensions to include (e.g. py,txt)
    #[arg(short = 'e', long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Glob patterns to ignore, relative to the scanned directory
    #[arg(long)]
    pub ignore: Vec<String>,

    /// How to handle files that are not valid UTF-8 (failfast|lossy)
    #[arg(long)]
    pub encoding: Option<EncodingMode>,

    /// Encoding tried when a file is not valid UTF-8 (e.g. windows-1251)
    #[arg(long)]
    pub fallback_encoding: Option<String>,
}

impl ScopeArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            file_extensions: self.extensions.clone(),
            ignore_patterns: self.ignore.clone(),
            no_recursive: self.no_recursive,
            encoding_mode: self.encoding,
            fallback_encoding: self.fallback_encoding.clone(),
            ..CliOverrides::default()
        }
    }
}

/// Options of commands that rewrite files
#[derive(Args, Debug, Clone, Default)]
pub struct WriteArgs {
    /// Show what would change without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not back up files before rewriting them
    #[arg(long)]
    pub no_backup: bool,

    /// Show the changed lines of every file
    #[arg(long)]
    pub diff: bool,

    /// Do not ask for confirmation in an interactive session
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search for a pattern in files
    Search {
        /// Pattern to search for
        pattern: String,

        /// File or directory to search (default: the project directory)
        path: Option<PathBuf>,

        #[command(flatten)]
        pattern_args: PatternArgs,

        #[command(flatten)]
        scope: ScopeArgs,

        /// Number of context lines after each match
        #[arg(short = 'A', long)]
        after_context: Option<usize>,

        /// Number of context lines before each match
        #[arg(short = 'B', long)]
        before_context: Option<usize>,

        /// Show only statistics, not matches
        #[arg(short, long)]
        stats: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a pattern in files
    Replace {
        /// Pattern to replace
        pattern: String,

        /// Text to put in place of every match
        #[arg(allow_hyphen_values = true)]
        replacement: String,

        /// File or directory to change (default: the project directory)
        path: Option<PathBuf>,

        #[command(flatten)]
        pattern_args: PatternArgs,

        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        write: WriteArgs,
    },

    /// Delete a pattern from files
    Delete {
        /// Pattern to delete
        pattern: String,

        /// File or directory to change (default: the project directory)
        path: Option<PathBuf>,

        #[command(flatten)]
        pattern_args: PatternArgs,

        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        write: WriteArgs,
    },

    /// Report files that cannot be decoded and JSON/YAML files with syntax errors
    Check {
        /// File or directory to check (default: the project directory)
        path: Option<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// List replacements that can be undone
    ListUndo,

    /// Undo a previous replacement
    Undo {
        /// ID shown by list-undo
        id: u64,
    },
}

impl Command {
    /// Question to ask before running the command interactively, if it needs one
    pub fn confirmation_prompt(&self) -> Option<String> {
        let (pattern, write) = match self {
            Command::Replace {
                pattern,
                replacement,
                write,
                ..
            } => (
                format!("Replace '{}' with '{}'", pattern, replacement),
                write,
            ),
            Command::Delete { pattern, write, .. } => (format!("Delete '{}'", pattern), write),
            _ => return None,
        };
        if write.dry_run || write.yes {
            return None;
        }
        Some(format!("{} in the project files? [y/N] ", pattern))
    }
}

/// Runs one command, writing its report to `out`. Returns the history entry for it.
pub fn execute(command: Command, base: &HelperConfig, out: &mut dyn Write) -> Result<String> {
    debug!("Executing {:?}", command);
    match command {
        Command::Search {
            pattern,
            path,
            pattern_args,
            scope,
            after_context,
            before_context,
            stats,
            json,
        } => {
            let config = base.clone().merge_with_cli(CliOverrides {
                context_after: after_context,
                context_before: before_context,
                ..scope.overrides()
            });
            let query = SearchQuery::new(
                pattern_args.definition(&pattern),
                config.scope_for(path.as_deref()),
            );
            let output = Searcher::from_config(query, &config)?.search()?;

            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
            } else {
                print_search_results(out, &output, stats)?;
            }
            Ok(format!(
                "Search for '{}' finished: {} files",
                pattern, output.files_with_matches
            ))
        }
        Command::Replace {
            pattern,
            replacement,
            path,
            pattern_args,
            scope,
            write,
        } => {
            let replacement = ReplacementPattern::new(pattern_args.definition(&pattern), replacement);
            run_replacement(replacement, path.as_deref(), &scope, &write, base, out)
        }
        Command::Delete {
            pattern,
            path,
            pattern_args,
            scope,
            write,
        } => {
            let replacement = ReplacementPattern::deletion(pattern_args.definition(&pattern));
            run_replacement(replacement, path.as_deref(), &scope, &write, base, out)
        }
        Command::Check { path, scope } => {
            let config = base.clone().merge_with_cli(scope.overrides());
            let report = check_scope(
                &config.scope_for(path.as_deref()),
                &config.scan_filter(),
                &config.codec()?,
            )?;

            if report.is_clean() {
                writeln!(out, "No problems found ({} files checked)", report.files_checked)?;
            } else {
                for found in &report.issues {
                    writeln!(out, "{}", found.to_string().red())?;
                }
                writeln!(
                    out,
                    "\nFound {} problems in {} files checked",
                    report.issues.len(),
                    report.files_checked
                )?;
            }
            Ok(format!("Check finished: {} problems", report.issues.len()))
        }
        Command::ListUndo => {
            let workspace = Workspace::detect(&base.root_path)?;
            let operations = list_undo_operations(&workspace)?;
            if operations.is_empty() {
                writeln!(out, "No undo operations available")?;
            } else {
                writeln!(out, "Available undo operations:")?;
                for (info, _) in &operations {
                    writeln!(
                        out,
                        "ID: {}  [{}]  {} ({} files)",
                        info.id.to_string().yellow(),
                        format_id_time(info.id),
                        info.description,
                        info.file_count
                    )?;
                }
            }
            Ok(format!("Listed {} undo operations", operations.len()))
        }
        Command::Undo { id } => {
            let workspace = Workspace::detect(&base.root_path)?;
            let info = undo_by_id(id, &workspace)
                .with_context(|| format!("Failed to undo operation {}", id))?;
            writeln!(
                out,
                "Restored {} files from operation {} ({})",
                info.file_count, id, info.description
            )?;
            Ok(format!("Undo of '{}' finished", info.description))
        }
    }
}

fn run_replacement(
    pattern: ReplacementPattern,
    path: Option<&Path>,
    scope: &ScopeArgs,
    write: &WriteArgs,
    base: &HelperConfig,
    out: &mut dyn Write,
) -> Result<String> {
    let config = base.clone().merge_with_cli(CliOverrides {
        no_backup: write.no_backup,
        ..scope.overrides()
    });
    let description = pattern.describe();
    let set = ReplacementSet::new(
        ReplacementConfig::from_helper_config(pattern, &config).dry_run(write.dry_run),
        config.codec()?,
    )?
    .with_project_root(&config.root_path)
    .with_progress(true);

    let report = set.apply(&config.scope_for(path), &config.scan_filter())?;
    print_replacement_results(out, &report, write.diff || write.dry_run)?;

    Ok(format!(
        "{} finished: {} files changed",
        description,
        report.changed_files().count()
    ))
}

fn print_search_results(
    out: &mut dyn Write,
    result: &projhelper::SearchOutput,
    stats_only: bool,
) -> Result<()> {
    if !stats_only {
        for file_result in &result.file_results {
            writeln!(out, "\n{}", file_result.path.display().to_string().blue())?;
            for m in &file_result.matches {
                for (line_num, line) in &m.context_before {
                    writeln!(out, "{}- {}", line_num.to_string().green(), line)?;
                }
                writeln!(
                    out,
                    "{}:{}: {}",
                    m.line_number.to_string().green(),
                    m.start,
                    m.line_content
                )?;
                for (line_num, line) in &m.context_after {
                    writeln!(out, "{}- {}", line_num.to_string().green(), line)?;
                }
            }
        }
    }

    for failure in &result.failures {
        writeln!(
            out,
            "{} {}: {}",
            "Skipped".yellow(),
            failure.path.display(),
            failure.error
        )?;
    }

    writeln!(
        out,
        "\nFound {} matches in {} files ({} files searched)",
        result.total_matches, result.files_with_matches, result.files_searched
    )?;
    Ok(())
}

fn print_replacement_results(
    out: &mut dyn Write,
    report: &ReplacementReport,
    show_preview: bool,
) -> Result<()> {
    if report.dry_run {
        writeln!(out, "Dry run - no changes will be made")?;
    }

    for file in &report.files {
        match &file.outcome {
            Ok(count) => {
                writeln!(
                    out,
                    "{}: {} replacements",
                    file.path.display().to_string().blue(),
                    count
                )?;
                if let (true, Some(preview)) = (show_preview, &file.preview) {
                    print_preview(out, preview)?;
                }
            }
            Err(e) => writeln!(out, "{} {}: {}", "Skipped".yellow(), file.path.display(), e)?,
        }
    }

    let changed = report.changed_files().count();
    if changed == 0 {
        writeln!(out, "No matches found, nothing changed")?;
    } else if report.dry_run {
        writeln!(
            out,
            "Would replace {} occurrences in {} files",
            report.total_replacements(),
            changed
        )?;
    } else {
        writeln!(
            out,
            "Replaced {} occurrences in {} files",
            report.total_replacements(),
            changed
        )?;
    }

    if let Some(id) = report.undo_id {
        writeln!(out, "Undo with: undo {}", id)?;
    }
    if let Some(e) = &report.undo_error {
        writeln!(out, "{} could not save undo record: {}", "Warning:".yellow(), e)?;
    }
    Ok(())
}

fn format_id_time(id: u64) -> String {
    humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_millis(id)).to_string()
}
