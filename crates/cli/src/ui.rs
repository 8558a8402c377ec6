//! Terminal styling for changelogs and status lines.
//!
//! Colors follow `NO_COLOR` (https://no-color.org/) and TTY detection unless
//! `--color always|never` says otherwise.

use std::io::IsTerminal;

use owo_colors::OwoColorize;
use scrivener_core::{ChangeEntry, ChangeKind, MergeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    Always,
    Never,
    #[default]
    Auto,
}

impl ColorMode {
    /// Parse the `--color` flag value.
    pub fn from_flag(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "always" => Some(Self::Always),
            "never" => Some(Self::Never),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => Self::should_auto_colorize(),
        }
    }

    fn should_auto_colorize() -> bool {
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        std::io::stdout().is_terminal()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Style {
    colors: bool,
}

impl Style {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            colors: mode.is_enabled(),
        }
    }

    /// One changelog entry, colored by kind. Skipped entries are dimmed.
    pub fn change(&self, entry: &ChangeEntry) -> String {
        let line = entry.to_string();
        if !self.colors {
            return line;
        }
        if !entry.applied {
            return line.dimmed().to_string();
        }
        match entry.kind {
            ChangeKind::Original => line,
            ChangeKind::Added => line.green().to_string(),
            ChangeKind::Modified => line.yellow().to_string(),
            ChangeKind::Deleted => line.red().to_string(),
        }
    }

    /// The full changelog, one entry per line.
    pub fn changelog(&self, merge: &MergeResult) -> String {
        merge
            .changelog
            .iter()
            .map(|entry| self.change(entry))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `+added ~modified -deleted` counts of the changes that landed.
    pub fn summary(&self, merge: &MergeResult) -> String {
        let landed = |kind: ChangeKind| {
            merge
                .changelog
                .iter()
                .filter(|e| e.kind == kind && e.applied)
                .count()
        };
        let added = format!("+{}", landed(ChangeKind::Added));
        let modified = format!("~{}", landed(ChangeKind::Modified));
        let deleted = format!("-{}", landed(ChangeKind::Deleted));
        if self.colors {
            format!("{} {} {}", added.green(), modified.yellow(), deleted.red())
        } else {
            format!("{added} {modified} {deleted}")
        }
    }

    pub fn heading(&self, text: &str) -> String {
        if self.colors {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }
}
