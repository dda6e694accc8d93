use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::encoding::{EncodingMode, TextCodec};
use crate::errors::HelperResult;
use crate::scanner::{ScanFilter, SearchScope};

/// Name of the per-project configuration file
pub const LOCAL_CONFIG_FILE: &str = ".projhelper.yaml";

/// Configuration shared by every command.
///
/// # Configuration Locations
///
/// Files are merged in order, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/projhelper/config.yaml`
/// 2. Local `.projhelper.yaml` in the current directory
/// 3. Custom config file specified via `--config`
///
/// Command-line flags are applied last, see [`HelperConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # Directory commands operate on when no path is given
/// root_path: "."
///
/// # Only touch these extensions (omit for all text files)
/// file_extensions: ["py", "txt"]
///
/// # Glob patterns relative to the root
/// ignore_patterns: ["build/**", "**/*.min.js"]
///
/// # Descend into subdirectories
/// recursive: true
///
/// # failfast or lossy
/// encoding_mode: failfast
///
/// # Tried when a file is not valid UTF-8; files are written back in it
/// fallback_encoding: "windows-1251"
///
/// # Copy files into .projhelper/backups before rewriting them
/// backup_enabled: true
///
/// # trace, debug, info, warn, error
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Directory to operate on when a command names no path
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Optional list of file extensions to include (e.g., ["rs", "toml"])
    #[serde(default)]
    pub file_extensions: Option<Vec<String>>,

    /// Patterns to ignore (glob syntax, relative to the root)
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Whether directory scopes include subdirectories
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// How to treat files that cannot be decoded
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Encoding label tried when a file is not valid UTF-8
    #[serde(default)]
    pub fallback_encoding: Option<String>,

    /// Number of context lines to show before each match
    #[serde(default)]
    pub context_before: usize,

    /// Number of context lines to show after each match
    #[serde(default)]
    pub context_after: usize,

    /// Whether replacements back up the files they rewrite
    #[serde(default = "default_true")]
    pub backup_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            file_extensions: None,
            ignore_patterns: Vec::new(),
            recursive: true,
            encoding_mode: EncodingMode::default(),
            fallback_encoding: None,
            context_before: 0,
            context_after: 0,
            backup_enabled: true,
            log_level: default_log_level(),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_path: Option<PathBuf>,
    pub file_extensions: Option<Vec<String>>,
    pub ignore_patterns: Vec<String>,
    pub no_recursive: bool,
    pub encoding_mode: Option<EncodingMode>,
    pub fallback_encoding: Option<String>,
    pub context_before: Option<usize>,
    pub context_after: Option<usize>,
    pub no_backup: bool,
    pub log_level: Option<String>,
}

impl HelperConfig {
    /// Loads configuration from the default locations plus an explicit file, which must exist
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            // Global config
            dirs::config_dir().map(|p| p.join("projhelper").join("config.yaml")),
            // Local config
            Some(PathBuf::from(LOCAL_CONFIG_FILE)),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Applies command-line values on top of file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(root) = cli.root_path {
            self.root_path = root;
        }
        if cli.file_extensions.is_some() {
            self.file_extensions = cli.file_extensions;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns.extend(cli.ignore_patterns);
        }
        if cli.no_recursive {
            self.recursive = false;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if cli.fallback_encoding.is_some() {
            self.fallback_encoding = cli.fallback_encoding;
        }
        if let Some(n) = cli.context_before {
            self.context_before = n;
        }
        if let Some(n) = cli.context_after {
            self.context_after = n;
        }
        if cli.no_backup {
            self.backup_enabled = false;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Builds the text codec for this configuration
    pub fn codec(&self) -> HelperResult<TextCodec> {
        TextCodec::new(self.encoding_mode, self.fallback_encoding.as_deref())
    }

    /// Builds the scanner filter for this configuration
    pub fn scan_filter(&self) -> ScanFilter {
        ScanFilter {
            file_extensions: self.file_extensions.clone(),
            ignore_patterns: self.ignore_patterns.clone(),
        }
    }

    /// Resolves a command's path argument (relative to `root_path`) into a scope
    pub fn scope_for(&self, path: Option<&Path>) -> SearchScope {
        let target = match path {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.root_path.join(p),
            None => self.root_path.clone(),
        };
        SearchScope::from_path(target, self.recursive)
    }
}
