//! Command history shared by every wrapped base command.
//!
//! One history file holds the lines typed in all sessions; each entry remembers which
//! base command it was typed for so a session only recalls its own lines (plus
//! builtins, which are valid everywhere).

use crate::builtin::is_builtin;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One submitted line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Base command the line was typed for; empty for builtin lines.
    #[serde(default)]
    pub base: String,
    /// The line exactly as typed, without the base command.
    pub cmd: String,
}

impl Entry {
    pub fn new(base: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            cmd: cmd.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    base: String,
    entries: Vec<Entry>,
    path: Option<PathBuf>,
}

impl History {
    /// In-memory history for `base`, starting from previously recorded `entries`.
    pub fn new(base: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            base: base.into(),
            entries,
            path: None,
        }
    }

    /// Load the history file at `path`; [`History::sync`] writes back to it.
    ///
    /// A missing file is an empty history.
    pub fn open(base: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = load_entries(&path)?;
        log::debug!("loaded {} history entries from {}", entries.len(), path.display());
        Ok(Self {
            base: base.into(),
            entries,
            path: Some(path),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Record a submitted line.
    ///
    /// Empty lines and repeats of the most recent entry are dropped. Returns whether
    /// the line was recorded.
    pub fn add(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        if self.entries.last().is_some_and(|last| last.cmd == line) {
            return false;
        }

        let base = if is_builtin(line) {
            String::new()
        } else {
            self.base.clone()
        };
        self.entries.push(Entry::new(base, line));
        true
    }

    /// Lines that can be recalled in this session, oldest first.
    pub fn recallable(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.base == self.base || is_builtin(&entry.cmd))
            .map(|entry| entry.cmd.as_str())
    }

    /// Commands typed for this base whose text matches `pattern`, oldest first.
    pub fn matching(&self, pattern: &Regex) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.base == self.base && pattern.is_match(&entry.cmd))
            .map(|entry| entry.cmd.as_str())
            .collect()
    }

    /// Write every entry back to the history file, if there is one.
    pub fn sync(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }

        let data = serde_yaml::to_string(&self.entries)
            .context("could not serialize history entries")?;
        fs::write(path, data)
            .with_context(|| format!("could not sync history to {}", path.display()))?;

        log::debug!("synced {} history entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<Vec<Entry>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("could not read history file {}", path.display()));
        }
    };

    if data.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_yaml::from_str(&data)
        .with_context(|| format!("could not parse history file {}", path.display()))
}
