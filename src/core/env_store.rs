//! Flat `KEY=value` environment file with an in-memory read view.
//!
//! Reads never touch disk: the view is hydrated once by [`EnvStore::load`].
//! Writes rewrite the file atomically and update the view, so later reads in
//! the same run see them.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};
use crate::utils::{io, parser, validation};

#[derive(Debug, Clone)]
pub struct EnvStore {
    path: PathBuf,
    values: HashMap<String, String>,
    file_keys: BTreeSet<String>,
}

impl EnvStore {
    /// Hydrate from the process environment, then from `path` for keys the
    /// process does not already define. A missing file is an empty file, and
    /// a key defined twice in the file takes its last value.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::empty(path.into());
        store.values.extend(std::env::vars());
        store.merge_file()?;
        Ok(store)
    }

    /// Hydrate from `path` only, ignoring the process environment.
    pub fn load_isolated(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::empty(path.into());
        store.merge_file()?;
        Ok(store)
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            values: HashMap::new(),
            file_keys: BTreeSet::new(),
        }
    }

    fn merge_file(&mut self) -> Result<()> {
        let operation = format!("read {}", self.path.display());
        if let Some(content) = io::read_file_optional(&self.path, &operation)? {
            // Within the file the last definition wins, as it would for `sh`.
            let inherited: BTreeSet<String> = self.values.keys().cloned().collect();
            for (key, value) in parse(&content) {
                if !inherited.contains(&key) {
                    self.values.insert(key.clone(), value);
                }
                self.file_keys.insert(key);
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a key. Empty values read as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Look up a key that must be present.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::config_missing_key(key, Some(self.path.display().to_string())))
    }

    /// Values that came from (or were written to) the env file, for export
    /// into child processes.
    pub fn file_env(&self) -> Vec<(String, String)> {
        self.file_keys
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Replace or append `key=value` in the file, then update the view.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !validation::is_env_key(key) {
            return Err(Error::validation_invalid_argument(
                "key",
                format!("'{}' is not a valid environment variable name", key),
                None,
                None,
            ));
        }

        let operation = format!("update {}", self.path.display());
        let current = io::read_file_optional(&self.path, &operation)?.unwrap_or_else(header);
        let updated = upsert(&current, key, value)?;
        io::write_file_atomic(&self.path, &updated, &operation)?;

        tracing::debug!(target: "env", key, path = %self.path.display(), "wrote env entry");

        self.values.insert(key.to_string(), value.to_string());
        self.file_keys.insert(key.to_string());
        Ok(())
    }
}

/// Header written when the env file does not exist yet.
fn header() -> String {
    format!(
        "# Managed by deploywire. Created {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn definition_pattern(key: &str) -> Result<Regex> {
    parser::compile(
        &format!(r"^\s*(export\s+)?{}\s*=", regex::escape(key)),
        "key",
    )
}

/// Rewrite `content` so that exactly one active definition of `key` holds `value`.
///
/// The first existing definition is replaced in place (keeping an `export `
/// prefix); later duplicates are dropped. Without one, a line is appended.
pub fn upsert(content: &str, key: &str, value: &str) -> Result<String> {
    let re = definition_pattern(key)?;
    let rendered = render_value(value);
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;

    for line in content.lines() {
        match re.captures(line) {
            Some(_) if replaced => continue,
            Some(caps) => {
                let prefix = if caps.get(1).is_some() { "export " } else { "" };
                lines.push(format!("{}{}={}", prefix, key, rendered));
                replaced = true;
            }
            None => lines.push(line.to_string()),
        }
    }

    if !replaced {
        lines.push(format!("{}={}", key, rendered));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn render_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || c == '#' || c == '"' || c == '\'');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

/// Parse env file content into ordered `(key, value)` pairs.
///
/// Later definitions of the same key appear later in the list.
pub fn parse(content: &str) -> Vec<(String, String)> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let body = trimmed
        .strip_prefix("export")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim_start)
        .unwrap_or(trimmed);

    let (key, raw) = body.split_once('=')?;
    let key = key.trim();
    if !validation::is_env_key(key) {
        return None;
    }

    Some((key.to_string(), parse_value(raw.trim())))
}

fn parse_value(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return unescape_double(&raw[1..raw.len() - 1]);
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}

fn unescape_double(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
