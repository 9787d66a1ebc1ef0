//! Node configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use artel_sync::SyncConfig;

/// Configuration for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Display name of the locally hosted artist.
    pub artist_name: String,
    /// Optional hex pubkey the operator expects the signing oracle to hold.
    /// Registration fails if the oracle's identity disagrees.
    pub artist_pubkey: Option<String>,
    /// Address the sync service listens on.
    pub listen_addr: String,
    /// Upper bound on concurrent peer syncs during fan-out.
    pub max_concurrent_syncs: usize,
    /// Per-round-trip timeout, in milliseconds.
    pub request_timeout_ms: u64,
    /// Connection establishment timeout, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            artist_name: String::new(),
            artist_pubkey: None,
            listen_addr: "0.0.0.0:53545".into(),
            max_concurrent_syncs: 4,
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl NodeConfig {
    /// A config hosting the named artist, defaults elsewhere.
    pub fn for_artist(artist_name: impl Into<String>) -> Self {
        Self {
            artist_name: artist_name.into(),
            ..Self::default()
        }
    }

    /// The sync-layer view of the configured timeouts.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:53545");
        assert_eq!(config.max_concurrent_syncs, 4);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"artist_name": "Alice In Chains"}"#).unwrap();
        assert_eq!(config.artist_name, "Alice In Chains");
        assert_eq!(config.max_concurrent_syncs, 4);
    }
}
