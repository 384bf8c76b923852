//! HTTP client for talking to peer nodes
//!
//! Peers expose the same API as this node: `/chain`, `/broadcast` and
//! `/mineBroadcast`. Every call is bounded by the configured timeouts so a
//! dead peer never stalls the caller for long.

use crate::config::{NetworkConfig, PeerConfig};
use crate::consensus::PeerChain;
use crate::error::{ChainError, Result};
use crate::transaction::Transaction;
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct PeerClient {
    client: reqwest::Client,
    mine_timeout: Duration,
}

/// Joins a peer base URL and an API path with exactly one slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl PeerClient {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(network.connect_timeout())
            .timeout(network.request_timeout())
            .build()?;
        Ok(Self {
            client,
            mine_timeout: network.mine_timeout(),
        })
    }

    /// GET `/chain` and decode the `{chain, length}` body.
    pub async fn fetch_chain(&self, peer: &PeerConfig) -> Result<PeerChain> {
        let response = self.client.get(endpoint(&peer.url, "chain")).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ChainError::NetworkError(format!(
                "peer {} returned {} for /chain",
                peer.index, status
            )));
        }
        Ok(response.json::<PeerChain>().await?)
    }

    /// POST a proof-carrying transaction to the peer's `/broadcast`.
    ///
    /// A rejection by the peer (401) is reported as an authentication error so
    /// callers can tell it apart from transport failures.
    pub async fn broadcast_transaction(&self, peer: &PeerConfig, tx: &Transaction) -> Result<()> {
        let response = self
            .client
            .post(endpoint(&peer.url, "broadcast"))
            .json(tx)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ChainError::AuthenticationFailed(format!(
                "peer {} rejected transaction from {}",
                peer.index, tx.owner
            ))),
            status => Err(ChainError::NetworkError(format!(
                "peer {} returned {} for /broadcast",
                peer.index, status
            ))),
        }
    }

    /// GET `/mineBroadcast`. Mining may take a while, so this call uses the
    /// longer mine timeout instead of the request timeout.
    pub async fn request_mine(&self, peer: &PeerConfig) -> Result<()> {
        let response = self
            .client
            .get(endpoint(&peer.url, "mineBroadcast"))
            .timeout(self.mine_timeout)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ChainError::NetworkError(format!(
                "peer {} returned {} for /mineBroadcast",
                peer.index, status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_with_single_slash() {
        assert_eq!(endpoint("http://localhost:5001", "chain"), "http://localhost:5001/chain");
        assert_eq!(endpoint("http://localhost:5001/", "/chain"), "http://localhost:5001/chain");
        assert_eq!(
            endpoint("http://10.0.0.2:8080/node/", "mineBroadcast"),
            "http://10.0.0.2:8080/node/mineBroadcast"
        );
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_network_error() {
        let network = NetworkConfig {
            connect_timeout_ms: 200,
            request_timeout_ms: 500,
            ..NetworkConfig::default()
        };
        let client = PeerClient::new(&network).unwrap();
        // Port 1 is reserved and nothing listens there.
        let peer = PeerConfig {
            index: 9,
            url: "http://127.0.0.1:1".to_string(),
        };

        let result = tokio::time::timeout(Duration::from_secs(5), client.fetch_chain(&peer))
            .await
            .expect("fetch should not hang");
        assert!(matches!(result, Err(ChainError::NetworkError(_))));
    }
}
