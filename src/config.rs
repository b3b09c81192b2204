//! Project settings (`fieldguard.yml`)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const SETTINGS_FILE: &str = "fieldguard.yml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Prefix of project paths, added to ignore entries that lack it.
    pub scheme: String,

    /// Ignore file, relative to the project root.
    pub ignore_file: String,

    /// Type manifest, relative to the project root.
    pub type_manifest: String,

    /// Print a summary when validation passes.
    pub print_success: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scheme: "res://".to_string(),
            ignore_file: ".fieldignore".to_string(),
            type_manifest: "fieldguard.types.yml".to_string(),
            print_success: true,
        }
    }
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse settings")
    }

    /// Settings for the project at `root`; defaults when no settings file exists.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid settings file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Settings::load(dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = Settings::from_yaml("ignore_file: .validatorignore\nprint_success: false\n").unwrap();
        assert_eq!(settings.ignore_file, ".validatorignore");
        assert!(!settings.print_success);
        assert_eq!(settings.scheme, "res://");
        assert_eq!(settings.type_manifest, "fieldguard.types.yml");
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Settings::from_yaml("\n").unwrap(), Settings::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "schema: res://\n").unwrap();

        let err = Settings::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid settings file"));
    }
}
