//! Application configuration: node candidate list and data directory.
//!
//! Loaded from `config.json` under the wallet's data directory, created
//! with defaults on first run. Per-wallet RPC and explorer overrides live
//! in the registry; this file holds the process-level defaults and the
//! failover candidate list.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_node_urls")]
    pub node_urls: Vec<String>,

    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_node_urls() -> Vec<String> {
    vec!["https://node.xian.org".to_string()]
}

fn default_rpc_url() -> String {
    "https://node.xian.org".to_string()
}

fn default_explorer_url() -> String {
    "https://explorer.xian.org".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("xian-wallet")
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            node_urls: default_node_urls(),
            rpc_url: default_rpc_url(),
            explorer_url: default_explorer_url(),
            data_dir: default_data_dir(),
        }
    }
}

impl NodeConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)?;
            let config: NodeConfig = serde_json::from_str(&contents)?;
            Ok(config)
        } else {
            let config = NodeConfig::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        default_data_dir().join("config.json")
    }

    /// Where the wallet registry's sled tree lives.
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.node_urls, vec!["https://node.xian.org".to_string()]);
        assert_eq!(config.rpc_url, "https://node.xian.org");
        assert!(config.registry_path().ends_with("registry"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"rpc_url":"https://testnet.xian.org"}"#).unwrap();
        assert_eq!(config.rpc_url, "https://testnet.xian.org");
        assert_eq!(config.node_urls, vec!["https://node.xian.org".to_string()]);
        assert_eq!(config.explorer_url, "https://explorer.xian.org");
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = NodeConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rpc_url, config.rpc_url);
        assert_eq!(parsed.node_urls, config.node_urls);
    }
}
