//! Configuration management for ChainDrug
//!
//! A node reads `config.toml` (or the path given on the command line). When no
//! file exists the built-in defaults describe the original four-node
//! deployment on `localhost:5000..5003`.

use crate::crypto::{IdentityParams, IdentityTable};
use crate::error::ChainError;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default = "default_peers")]
    pub peers: Vec<PeerConfig>,
    #[serde(default = "default_identities")]
    pub identities: Vec<IdentityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// This node's index into `peers` and `identities`.
    #[serde(default)]
    pub index: u64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Party ids of node owners are `owner_offset + node index`.
    #[serde(default = "default_owner_offset")]
    pub owner_offset: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound for a peer to answer a mine request.
    #[serde(default = "default_mine_timeout_secs")]
    pub mine_timeout_secs: u64,
    /// Period of the background conflict resolution; 0 disables it.
    #[serde(default)]
    pub resolve_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    /// Mining restarts when the tip moves underneath it, at most this often.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerConfig {
    pub index: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityConfig {
    pub index: u64,
    pub a: u64,
    pub b: u64,
    pub p: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            index: 0,
            host: default_host(),
            port: default_port(),
            owner_offset: default_owner_offset(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            mine_timeout_secs: default_mine_timeout_secs(),
            resolve_interval_secs: 0,
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            network: NetworkConfig::default(),
            mining: MiningConfig::default(),
            peers: default_peers(),
            identities: default_identities(),
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn mine_timeout(&self) -> Duration {
        Duration::from_secs(self.mine_timeout_secs)
    }

    pub fn resolve_interval(&self) -> Option<Duration> {
        (self.resolve_interval_secs > 0).then(|| Duration::from_secs(self.resolve_interval_secs))
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Party id of the owner registered at this node.
    pub fn own_party_id(&self) -> u64 {
        self.node.owner_offset + self.node.index
    }

    /// Peers other than this node, in configuration order.
    pub fn remote_peers(&self) -> Vec<PeerConfig> {
        self.peers
            .iter()
            .filter(|peer| peer.index != self.node.index)
            .cloned()
            .collect()
    }

    pub fn identity_table(&self) -> Result<IdentityTable, ChainError> {
        IdentityTable::new(self.identities.iter().map(|id| {
            (
                id.index,
                IdentityParams {
                    a: id.a,
                    b: id.b,
                    p: id.p,
                },
            )
        }))
    }

    /// Apply command-line overrides and re-validate.
    ///
    /// Selecting another node index without an explicit port picks up the
    /// port from that node's own `[[peers]]` entry, if it has one.
    pub fn apply_overrides(&mut self, index: Option<u64>, port: Option<u16>) -> Result<(), ChainError> {
        if let Some(index) = index {
            self.node.index = index;
            if port.is_none() {
                if let Some(own_port) = self.own_peer_port() {
                    self.node.port = own_port;
                }
            }
        }
        if let Some(port) = port {
            self.node.port = port;
        }
        self.validate()
    }

    fn own_peer_port(&self) -> Option<u16> {
        self.peers
            .iter()
            .find(|peer| peer.index == self.node.index)
            .and_then(|peer| reqwest::Url::parse(&peer.url).ok())
            .and_then(|url| url.port_or_known_default())
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.node.host.is_empty() {
            return Err(ChainError::ConfigError("node.host must be set".to_string()));
        }

        let table = self.identity_table()?;
        if table.get(self.node.index).is_err() {
            return Err(ChainError::ConfigError(format!(
                "no identity configured for node index {}",
                self.node.index
            )));
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer.index) {
                return Err(ChainError::ConfigError(format!(
                    "duplicate peer index {}",
                    peer.index
                )));
            }
            if !(peer.url.starts_with("http://") || peer.url.starts_with("https://")) {
                return Err(ChainError::ConfigError(format!(
                    "peer {} url must start with http:// or https://, got {}",
                    peer.index, peer.url
                )));
            }
        }

        if self.mining.max_attempts == 0 {
            return Err(ChainError::ConfigError(
                "mining.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.network.request_timeout_ms == 0 || self.network.connect_timeout_ms == 0 {
            return Err(ChainError::ConfigError(
                "network timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load the configuration at `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }
    let config_str = fs::read_to_string(path)?;
    Config::from_toml_str(&config_str)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_owner_offset() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_mine_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    5
}

fn default_peers() -> Vec<PeerConfig> {
    (0..4)
        .map(|i| PeerConfig {
            index: i,
            url: format!("http://localhost:{}", 5000 + i),
        })
        .collect()
}

fn default_identities() -> Vec<IdentityConfig> {
    [
        (350, 2618, 17189),
        (490, 20109, 52691),
        (640, 18099, 54787),
        (720, 17066, 25657),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (a, b, p))| IdentityConfig {
        index: i as u64,
        a,
        b,
        p,
    })
    .collect()
}
