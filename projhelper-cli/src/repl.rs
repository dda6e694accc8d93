use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use projhelper::HelperConfig;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{info, warn};

use crate::commands::{execute, Command};

const HELP_TEXT: &str = "\
Available commands:
  search <pattern> [path]                 Find lines containing a pattern
  replace <pattern> <replacement> [path]  Replace a pattern in files
  delete <pattern> [path]                 Remove a pattern from files
  check [path]                            Report undecodable files and JSON/YAML syntax errors
  list-undo                               Show replacements that can be undone
  undo <id>                               Restore the files changed by a replacement
  history                                 Show what was done in this session
  help                                    Show this list
  exit | quit                             Leave the session

Pattern flags: -r regex, -w wildcard, -i ignore case.
Paths are relative to the project directory. Run '<command> --help' for every option.";

/// One line typed into the session
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    #[command(flatten)]
    Run(Command),

    /// Show the available commands
    Help,

    /// Show what was done in this session
    History,

    /// Leave the session
    #[command(alias = "quit")]
    Exit,
}

/// A completed action and when it finished
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub time: SystemTime,
    pub action: String,
}

/// Interactive session reading commands line by line
pub struct Session<R, W> {
    input: R,
    output: W,
    config: HelperConfig,
    history: Vec<HistoryEntry>,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(input: R, output: W, config: HelperConfig) -> Self {
        Self {
            input,
            output,
            config,
            history: Vec::new(),
        }
    }

    /// Runs until `exit` or end of input. Without `directory` the user is asked for one.
    pub fn run(&mut self, directory: Option<PathBuf>) -> Result<()> {
        let directory = match directory {
            Some(dir) => dir,
            None => match self.prompt("Enter the project directory: ")? {
                Some(line) if !line.is_empty() => PathBuf::from(line),
                Some(_) => PathBuf::from("."),
                None => return Ok(()),
            },
        };

        if !directory.is_dir() {
            warn!("Project directory {} does not exist", directory.display());
            writeln!(
                self.output,
                "{} {} is not a directory",
                "Warning:".yellow(),
                directory.display()
            )?;
        }
        info!("Session started in {}", directory.display());
        self.config.root_path = directory;
        writeln!(self.output, "Type 'help' for a list of commands.")?;

        while let Some(line) = self.prompt("projhelper> ")? {
            if line.is_empty() {
                continue;
            }
            if !self.handle_line(&line)? {
                break;
            }
        }
        Ok(())
    }

    /// Handles one command line; returns false when the session should end
    fn handle_line(&mut self, line: &str) -> Result<bool> {
        let tokens = match tokenize(line) {
            Ok(tokens) => tokens,
            Err(message) => {
                writeln!(self.output, "{} {}", "Error:".red(), message)?;
                return Ok(true);
            }
        };

        let parsed = match SessionLine::try_parse_from(tokens) {
            Ok(parsed) => parsed,
            Err(e) => {
                writeln!(self.output, "{}", e.render())?;
                return Ok(true);
            }
        };

        match parsed.command {
            SessionCommand::Help => writeln!(self.output, "{}", HELP_TEXT)?,
            SessionCommand::History => self.print_history()?,
            SessionCommand::Exit => {
                writeln!(self.output, "Goodbye!")?;
                return Ok(false);
            }
            SessionCommand::Run(command) => {
                if let Some(question) = command.confirmation_prompt() {
                    let answer = self.prompt(&question)?.unwrap_or_default();
                    if !matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
                        writeln!(self.output, "Cancelled.")?;
                        return Ok(true);
                    }
                }

                match execute(command, &self.config, &mut self.output) {
                    Ok(action) => self.history.push(HistoryEntry {
                        time: SystemTime::now(),
                        action,
                    }),
                    Err(e) => writeln!(self.output, "{} {:#}", "Error:".red(), e)?,
                }
            }
        }
        Ok(true)
    }

    fn print_history(&mut self) -> Result<()> {
        if self.history.is_empty() {
            writeln!(self.output, "History is empty")?;
            return Ok(());
        }
        writeln!(self.output, "Action history:")?;
        for entry in &self.history {
            writeln!(
                self.output,
                "[{}] {}",
                humantime::format_rfc3339_seconds(entry.time),
                entry.action
            )?;
        }
        Ok(())
    }

    /// Writes `message` and reads one trimmed line; `None` at end of input
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        write!(self.output, "{}", message)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

/// Splits a command line into words. Single or double quotes group words; inside double quotes
/// a backslash escapes the next character.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch) => current.push(ch),
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
