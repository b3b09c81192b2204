//! Path-prefix exclusion list (`.fieldignore`)

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Directory names never scanned, whatever the ignore file says.
pub static ALWAYS_EXCLUDED_DIRS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        // Editor import cache and metadata
        ".godot",
        ".import",
        // Build output of the scripting toolchain
        ".mono",
        // Version control
        ".git",
    ])
});

/// Entries written to a freshly created ignore file.
pub const DEFAULT_ENTRIES: &[&str] = &[".godot/", "addons/"];

/// Ordered list of ignored path prefixes, stored with their scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    entries: Vec<String>,
}

impl IgnoreList {
    /// Parse ignore-file contents; `#` comments and blank lines are skipped.
    pub fn parse(contents: &str, scheme: &str) -> Self {
        let entries = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| with_scheme(line, scheme))
            .collect();
        Self { entries }
    }

    pub fn defaults(scheme: &str) -> Self {
        Self {
            entries: DEFAULT_ENTRIES
                .iter()
                .map(|entry| with_scheme(entry, scheme))
                .collect(),
        }
    }

    /// Read the ignore file at `path`, creating it with the defaults if it is missing.
    pub fn load_or_bootstrap(path: &Path, scheme: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let list = Self::parse(&contents, scheme);
                debug!("Loaded {} ignore entries from {}", list.len(), path.display());
                list
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                match std::fs::write(path, default_file_contents(scheme)) {
                    Ok(()) => info!("Created default ignore file at {}", path.display()),
                    Err(err) => warn!(
                        "Could not create ignore file at {}: {err}; using defaults",
                        path.display()
                    ),
                }
                Self::defaults(scheme)
            }
            Err(err) => {
                warn!(
                    "Could not read ignore file at {}: {err}; using defaults",
                    path.display()
                );
                Self::defaults(scheme)
            }
        }
    }

    /// True if `path` equals an entry or lies under one.
    pub fn is_ignored(&self, path: &str) -> bool {
        let path = trim_separator(path);
        self.entries.iter().any(|entry| {
            let entry = trim_separator(entry);
            path == entry
                || path
                    .strip_prefix(entry)
                    .is_some_and(|rest| rest.starts_with('/') || entry.ends_with('/'))
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a directory name is excluded regardless of configuration.
pub fn is_always_excluded(dir_name: &str) -> bool {
    ALWAYS_EXCLUDED_DIRS.contains(dir_name)
}

pub fn default_file_contents(scheme: &str) -> String {
    let mut contents = String::from(
        "# Paths excluded from required-field validation.\n\
         # One path per line; a trailing '/' marks a directory.\n",
    );
    for entry in DEFAULT_ENTRIES {
        contents.push_str(&with_scheme(entry, scheme));
        contents.push('\n');
    }
    contents
}

fn with_scheme(entry: &str, scheme: &str) -> String {
    if entry.starts_with(scheme) {
        entry.to_string()
    } else {
        format!("{scheme}{}", entry.trim_start_matches('/'))
    }
}

/// Drop one trailing separator, but never the one that ends a bare scheme (`res://`).
fn trim_separator(path: &str) -> &str {
    if path.ends_with("://") {
        path
    } else {
        path.strip_suffix('/').unwrap_or(path)
    }
}
