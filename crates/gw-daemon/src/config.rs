// config.rs — Daemon configuration file (gw.toml).
//
// Every section and field has a default, so an empty or missing file yields
// a working configuration. Command-line flags override file values in main.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gw_vcs::GitConfig;
use gw_workspace::StorageConfig;
use serde::{Deserialize, Serialize};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "gw.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub git: GitConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Answer CORS preflights for any origin.
    #[serde(default)]
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            permissive_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Load `explicit` if given (it must exist), else `gw.toml` in the
    /// working directory if present, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            let config = Self::load(&fallback)?;
            return Ok((config, Some(fallback)));
        }
        Ok((Self::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert!(!config.server.permissive_cors);
        assert_eq!(config.storage.root, PathBuf::from("./storage"));
        assert_eq!(config.git.rename_threshold, 50);
    }

    #[test]
    fn sections_are_independent() {
        let config: DaemonConfig = toml::from_str(
            r#"
[server]
port = 9090

[storage]
root = "/var/lib/gw"
primary_branch = "main"

[git]
network_timeout_secs = 15
"#,
        )
        .unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:9090");
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/gw"));
        assert_eq!(config.storage.primary_branch, "main");
        assert_eq!(config.git.network_timeout_secs, 15);
        assert_eq!(config.git.command_timeout_secs, 30);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DaemonConfig::resolve(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gw.toml");
        std::fs::write(&path, "[server]\nhost = \"127.0.0.1\"\n").unwrap();
        let (config, used) = DaemonConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(used, Some(path));
    }
}
