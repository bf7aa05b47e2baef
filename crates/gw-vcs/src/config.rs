//! Git backend configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::Identity;

/// Settings for [`GitBackend`](crate::GitBackend), read from the `[git]`
/// section of the daemon config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path or name of the git executable
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Similarity (percent) above which a delete/add pair is reported as a
    /// rename. 0 disables rename detection.
    #[serde(default = "default_rename_threshold")]
    pub rename_threshold: u8,

    /// Upper bound for a single fetch or push, in seconds
    #[serde(default = "default_network_timeout_secs")]
    pub network_timeout_secs: u64,

    /// Upper bound for every local git command, in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Identity recorded on merge commits created while pulling
    #[serde(default = "default_merge_identity")]
    pub merge_identity: Identity,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            rename_threshold: default_rename_threshold(),
            network_timeout_secs: default_network_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            merge_identity: default_merge_identity(),
        }
    }
}

impl GitConfig {
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// Serde default functions
fn default_executable() -> PathBuf {
    PathBuf::from("git")
}

fn default_rename_threshold() -> u8 {
    50
}

fn default_network_timeout_secs() -> u64 {
    120
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_merge_identity() -> Identity {
    Identity::new("gw", "gw@localhost")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        git: GitConfig,
    }

    #[test]
    fn partial_table_fills_defaults() {
        let parsed: Wrapper = toml::from_str("[git]\nrename_threshold = 80\n").unwrap();
        assert_eq!(parsed.git.rename_threshold, 80);
        assert_eq!(parsed.git.executable, PathBuf::from("git"));
        assert_eq!(parsed.git.network_timeout(), Duration::from_secs(120));
        assert_eq!(parsed.git.merge_identity.email, "gw@localhost");
    }

    #[test]
    fn merge_identity_table() {
        let parsed: Wrapper = toml::from_str(
            "[git]\nnetwork_timeout_secs = 5\n[git.merge_identity]\nname = \"Sync Bot\"\nemail = \"bot@example.com\"\n",
        )
        .unwrap();
        assert_eq!(parsed.git.network_timeout(), Duration::from_secs(5));
        assert_eq!(parsed.git.merge_identity, Identity::new("Sync Bot", "bot@example.com"));
    }
}
