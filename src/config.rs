//! Configuration — tool settings and the cluster inventory.
//!
//! Two separate files with separate jobs. `capstan.yaml` tunes the tool
//! itself (timeouts, parallelism, auth) and can be overridden per-key from
//! the environment. `cluster.yaml` is the inventory: which nodes exist,
//! how to reach them, and where the quorum device host lives.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::comm::{Target, DEFAULT_AGENT_PORT};

// ── Tool settings ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub comm: CommSettings,
    pub auth: AuthSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            comm: CommSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommSettings {
    pub request_timeout_secs: u64,
    pub parallelism: usize,
    pub call_timeout_secs: Option<u64>,
    pub use_tls: bool,
}

impl Default for CommSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            parallelism: 16,
            call_timeout_secs: None,
            use_tls: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// File holding the shared agent token, one line.
    pub token_file: Option<PathBuf>,
}

impl Settings {
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine the config directory")?;
        Ok(config_dir.join("capstan").join("capstan.yaml"))
    }

    /// Settings file merged with `CAPSTAN_*` environment overrides, e.g.
    /// `CAPSTAN_COMM__PARALLELISM=4`. A missing file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("CAPSTAN_").split("__"))
            .extract()
            .context("invalid capstan settings")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.comm.request_timeout_secs)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.comm.call_timeout_secs.map(Duration::from_secs)
    }

    pub fn auth_token(&self) -> Result<Option<String>> {
        match &self.auth.token_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read auth token from {}", path.display()))?;
                Ok(Some(raw.trim().to_string()))
            }
            None => Ok(None),
        }
    }
}

// ── Cluster inventory ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub cluster_name: String,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeEntry>,
    #[serde(default)]
    pub qnetd: Option<QnetdEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeEntry {
    pub addrs: Vec<String>,
    pub port: Option<u16>,
}

/// The quorum device host. Not a cluster member, but reached over the same
/// agent protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QnetdEntry {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Inventory {
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine the config directory")?;
        Ok(config_dir.join("capstan").join("cluster.yaml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cluster inventory from {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid cluster inventory in {}", path.display()))
    }

    /// All member nodes as communication targets, in label order.
    pub fn targets(&self) -> Vec<Target> {
        self.nodes
            .iter()
            .map(|(label, entry)| entry.to_target(label))
            .collect()
    }

    pub fn target(&self, label: &str) -> Option<Target> {
        self.nodes.get(label).map(|entry| entry.to_target(label))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.nodes.contains_key(label)
    }

    pub fn qnetd_target(&self) -> Option<Target> {
        self.qnetd.as_ref().map(|entry| {
            Target::new(
                entry.host.clone(),
                Vec::<String>::new(),
                entry.port.unwrap_or(DEFAULT_AGENT_PORT),
            )
        })
    }
}

impl NodeEntry {
    fn to_target(&self, label: &str) -> Target {
        Target::new(
            label,
            self.addrs.clone(),
            self.port.unwrap_or(DEFAULT_AGENT_PORT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
cluster_name: prod
nodes:
  n2:
    addrs: ["10.0.0.2"]
  n1:
    addrs: ["10.0.0.1", "192.168.0.1"]
    port: 3024
qnetd:
  host: arbiter.example.net
"#;

    #[test]
    fn inventory_parses_and_orders_targets_by_label() {
        let inventory: Inventory = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(inventory.cluster_name, "prod");

        let targets = inventory.targets();
        let labels: Vec<&str> = targets.iter().map(|t| t.label()).collect();
        assert_eq!(labels, vec!["n1", "n2"]);
        assert_eq!(targets[0].addrs(), ["10.0.0.1", "192.168.0.1"]);
        assert_eq!(targets[0].port(), 3024);
        assert_eq!(targets[1].port(), DEFAULT_AGENT_PORT);
    }

    #[test]
    fn qnetd_target_uses_the_host_as_label() {
        let inventory: Inventory = serde_yaml::from_str(SAMPLE).unwrap();
        let qnetd = inventory.qnetd_target().unwrap();
        assert_eq!(qnetd.label(), "arbiter.example.net");
        assert_eq!(qnetd.port(), DEFAULT_AGENT_PORT);
    }

    #[test]
    fn settings_default_and_load_from_file() {
        let defaults = Settings::default();
        assert_eq!(defaults.comm.parallelism, 16);
        assert_eq!(defaults.comm.request_timeout_secs, 30);
        assert!(defaults.comm.use_tls);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level: debug\ncomm:\n  parallelism: 4").unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.comm.parallelism, 4);
        // Untouched keys keep their defaults.
        assert_eq!(settings.comm.request_timeout_secs, 30);
    }

    #[test]
    fn auth_token_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  sekrit-token  ").unwrap();

        let settings = Settings {
            auth: AuthSettings {
                token_file: Some(file.path().to_path_buf()),
            },
            ..Settings::default()
        };
        assert_eq!(settings.auth_token().unwrap().as_deref(), Some("sekrit-token"));
    }
}
