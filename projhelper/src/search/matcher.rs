use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::trace;

use crate::errors::{HelperError, HelperResult};

/// Compiled regexes keyed by (source, case_insensitive), shared across matchers
static REGEX_CACHE: Lazy<DashMap<(String, bool), Arc<Regex>>> = Lazy::new(DashMap::new);

static CAPTURE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z0-9_]+)\}|([0-9]+))").expect("capture reference regex is valid")
});

/// How the pattern text is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Exact substring
    #[default]
    Literal,
    /// `*` matches any run of characters within a line (shortest first), `?` exactly one character
    Wildcard,
    /// Full regular expression syntax
    Regex,
}

/// A search pattern as written by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub text: String,
    #[serde(default)]
    pub kind: PatternKind,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl PatternDefinition {
    pub fn new(text: impl Into<String>, kind: PatternKind) -> Self {
        Self {
            text: text.into(),
            kind,
            case_insensitive: false,
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(text, PatternKind::Literal)
    }

    pub fn wildcard(text: impl Into<String>) -> Self {
        Self::new(text, PatternKind::Wildcard)
    }

    pub fn regex(text: impl Into<String>) -> Self {
        Self::new(text, PatternKind::Regex)
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }
}

/// Strategy for pattern matching
#[derive(Debug, Clone)]
enum MatchStrategy {
    Simple(String),
    Regex(Arc<Regex>),
}

/// Finds occurrences of one pattern inside single lines of text
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    definition: PatternDefinition,
    strategy: MatchStrategy,
}

impl PatternMatcher {
    /// Compiles a pattern. Fails with `InvalidPattern` before any file is read.
    pub fn new(definition: PatternDefinition) -> HelperResult<Self> {
        if definition.text.is_empty() {
            return Err(HelperError::invalid_pattern("Pattern cannot be empty"));
        }

        let strategy = match definition.kind {
            PatternKind::Literal if !definition.case_insensitive => {
                MatchStrategy::Simple(definition.text.clone())
            }
            PatternKind::Literal => MatchStrategy::Regex(compile(
                &regex::escape(&definition.text),
                true,
            )?),
            PatternKind::Wildcard => MatchStrategy::Regex(compile(
                &wildcard_to_regex(&definition.text),
                definition.case_insensitive,
            )?),
            PatternKind::Regex => {
                MatchStrategy::Regex(compile(&definition.text, definition.case_insensitive)?)
            }
        };

        if let MatchStrategy::Regex(regex) = &strategy {
            if regex.is_match("") {
                return Err(HelperError::invalid_pattern(format!(
                    "Pattern '{}' matches the empty string",
                    definition.text
                )));
            }
        }

        Ok(Self {
            definition,
            strategy,
        })
    }

    pub fn definition(&self) -> &PatternDefinition {
        &self.definition
    }

    /// Returns true if the line contains at least one match
    pub fn is_match(&self, line: &str) -> bool {
        match &self.strategy {
            MatchStrategy::Simple(pattern) => line.contains(pattern.as_str()),
            MatchStrategy::Regex(regex) => regex.is_match(line),
        }
    }

    /// Finds all non-overlapping matches in the line as `(start, end)` byte ranges
    pub fn find_matches(&self, line: &str) -> Vec<(usize, usize)> {
        match &self.strategy {
            MatchStrategy::Simple(pattern) => line
                .match_indices(pattern.as_str())
                .map(|(start, matched)| (start, start + matched.len()))
                .collect(),
            MatchStrategy::Regex(regex) => regex.find_iter(line).map(|m| (m.start(), m.end())).collect(),
        }
    }

    /// Replaces every match in the line, returning the new line and the number of replacements.
    ///
    /// Only regex patterns expand `$1`/`${name}` in the replacement; for literal and wildcard
    /// patterns the replacement is inserted verbatim.
    pub fn replace_all<'a>(&self, line: &'a str, replacement: &str) -> (Cow<'a, str>, usize) {
        let count = self.find_matches(line).len();
        if count == 0 {
            return (Cow::Borrowed(line), 0);
        }

        let replaced = match &self.strategy {
            MatchStrategy::Simple(pattern) => Cow::Owned(line.replace(pattern.as_str(), replacement)),
            MatchStrategy::Regex(regex) if self.definition.kind == PatternKind::Regex => {
                regex.replace_all(line, replacement)
            }
            MatchStrategy::Regex(regex) => regex.replace_all(line, NoExpand(replacement)),
        };
        (replaced, count)
    }

    /// Checks that every capture reference in `replacement` exists in a regex pattern
    pub fn validate_replacement(&self, replacement: &str) -> HelperResult<()> {
        let regex = match (&self.strategy, self.definition.kind) {
            (MatchStrategy::Regex(regex), PatternKind::Regex) => regex,
            _ => return Ok(()),
        };

        let group_count = regex.captures_len();
        for cap in CAPTURE_REF.captures_iter(replacement) {
            if let Some(name) = cap.get(1) {
                let name = name.as_str();
                let numeric_ok = name.parse::<usize>().is_ok_and(|n| n < group_count);
                if !numeric_ok && !regex.capture_names().flatten().any(|n| n == name) {
                    return Err(HelperError::invalid_pattern(format!(
                        "Capture group ${{{}}} does not exist",
                        name
                    )));
                }
            } else if let Some(num) = cap.get(2) {
                let num: usize = num.as_str().parse().unwrap_or(usize::MAX);
                if num >= group_count {
                    return Err(HelperError::invalid_pattern(format!(
                        "Capture group ${} does not exist",
                        num
                    )));
                }
            }
        }
        Ok(())
    }
}

fn compile(source: &str, case_insensitive: bool) -> HelperResult<Arc<Regex>> {
    let key = (source.to_string(), case_insensitive);
    if let Some(entry) = REGEX_CACHE.get(&key) {
        trace!("Regex cache hit for '{}'", source);
        return Ok(entry.clone());
    }

    let regex = RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| HelperError::invalid_pattern(e.to_string()))?;
    let regex = Arc::new(regex);
    REGEX_CACHE.insert(key, regex.clone());
    Ok(regex)
}

/// Translates a simple wildcard into an equivalent regex
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*?"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out
}
