//! Storage configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where workspaces live and how they are initialized. Built once at
/// startup and handed to the [`Registry`](crate::Registry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Workspaces live at `<root>/<owner>/<name>`
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Branch new workspaces start on, and the branch whose tracking
    /// reference ahead-counts are measured against
    #[serde(default = "default_primary_branch")]
    pub primary_branch: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            primary_branch: default_primary_branch(),
        }
    }
}

impl StorageConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

// Serde default functions
fn default_root() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_primary_branch() -> String {
    "master".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_uses_defaults() {
        let config: StorageConfig = toml::from_str("").unwrap();
        assert_eq!(config.root, PathBuf::from("./storage"));
        assert_eq!(config.primary_branch, "master");
    }

    #[test]
    fn explicit_values_win() {
        let config: StorageConfig =
            toml::from_str("root = \"/srv/gw\"\nprimary_branch = \"main\"\n").unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/gw"));
        assert_eq!(config.primary_branch, "main");
    }
}
