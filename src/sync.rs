//! Peer synchronization for ChainDrug
//!
//! The synchronizer fans requests out to every configured peer at once and
//! keeps per-peer bookkeeping:
//! - chain fetches for conflict resolution
//! - transaction broadcast and remote mine requests
//! - failure counting so flaky peers show up in the logs

use crate::config::PeerConfig;
use crate::consensus::PeerChain;
use crate::error::{ChainError, Result};
use crate::network::PeerClient;
use crate::transaction::Transaction;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Consecutive failures after which a peer is reported as unreliable.
pub const UNRELIABLE_AFTER: u32 = 3;

/// Peer sync information
#[derive(Debug, Clone)]
pub struct PeerSyncInfo {
    pub peer: PeerConfig,
    /// Chain length the peer reported on its last successful fetch.
    pub chain_length: usize,
    pub last_seen: Option<Instant>,
    pub chains_received: u64,
    /// Consecutive failures; reset by any successful exchange.
    pub sync_failures: u32,
}

impl PeerSyncInfo {
    pub fn new(peer: PeerConfig) -> Self {
        Self {
            peer,
            chain_length: 0,
            last_seen: None,
            chains_received: 0,
            sync_failures: 0,
        }
    }

    pub fn is_unreliable(&self) -> bool {
        self.sync_failures >= UNRELIABLE_AFTER
    }

    /// Not heard from in `max_age`, or never.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.last_seen.map_or(true, |seen| seen.elapsed() > max_age)
    }
}

/// Sync statistics
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub chains_fetched: u64,
    pub peer_failures: u64,
    pub transactions_broadcast: u64,
    pub mine_requests: u64,
}

/// Node synchronizer
pub struct NodeSynchronizer {
    client: PeerClient,
    /// Remote peers in configuration order; fan-out results keep this order.
    order: Vec<PeerConfig>,
    peers: Arc<RwLock<HashMap<u64, PeerSyncInfo>>>,
    stats: Arc<RwLock<SyncStats>>,
}

impl NodeSynchronizer {
    pub fn new(client: PeerClient, peers: Vec<PeerConfig>) -> Self {
        let table = peers
            .iter()
            .map(|peer| (peer.index, PeerSyncInfo::new(peer.clone())))
            .collect();
        Self {
            client,
            order: peers,
            peers: Arc::new(RwLock::new(table)),
            stats: Arc::new(RwLock::new(SyncStats::default())),
        }
    }

    pub fn peers(&self) -> &[PeerConfig] {
        &self.order
    }

    pub fn peer_count(&self) -> usize {
        self.order.len()
    }

    pub async fn get_peer_info(&self, index: u64) -> Option<PeerSyncInfo> {
        self.peers.read().await.get(&index).cloned()
    }

    pub async fn get_stats(&self) -> SyncStats {
        self.stats.read().await.clone()
    }

    pub async fn unreliable_peers(&self) -> Vec<u64> {
        let peers = self.peers.read().await;
        let mut indices: Vec<u64> = peers
            .values()
            .filter(|p| p.is_unreliable())
            .map(|p| p.peer.index)
            .collect();
        indices.sort_unstable();
        indices
    }

    async fn record_seen(&self, index: u64) {
        if let Some(peer) = self.peers.write().await.get_mut(&index) {
            peer.last_seen = Some(Instant::now());
            peer.sync_failures = 0;
        }
    }

    async fn record_chain(&self, index: u64, length: usize) {
        if let Some(peer) = self.peers.write().await.get_mut(&index) {
            peer.chain_length = length;
            peer.chains_received += 1;
            peer.last_seen = Some(Instant::now());
            peer.sync_failures = 0;
        }
        self.stats.write().await.chains_fetched += 1;
    }

    async fn record_failure(&self, index: u64, op: &str, err: &ChainError) {
        warn!(peer = index, op, error = %err, "sync.peer_failed");
        if let Some(peer) = self.peers.write().await.get_mut(&index) {
            peer.sync_failures += 1;
            if peer.sync_failures == UNRELIABLE_AFTER {
                warn!(peer = index, url = %peer.peer.url, "Peer marked as unreliable");
            }
        }
        self.stats.write().await.peer_failures += 1;
    }

    /// Run `f` against every peer concurrently and return the outcomes in
    /// configuration order. A panicking task is logged and dropped.
    async fn fan_out<T, F, Fut>(&self, op: &'static str, f: F) -> Vec<(PeerConfig, Result<T>)>
    where
        F: Fn(PeerClient, PeerConfig) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut set = JoinSet::new();
        for (position, peer) in self.order.iter().enumerate() {
            let request = f(self.client.clone(), peer.clone());
            let peer = peer.clone();
            set.spawn(async move { (position, peer, request.await) });
        }

        let mut outcomes = Vec::with_capacity(self.order.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(op, error = %e, "sync.task_failed"),
            }
        }
        outcomes.sort_by_key(|(position, _, _)| *position);
        outcomes
            .into_iter()
            .map(|(_, peer, result)| (peer, result))
            .collect()
    }

    /// Fetch every peer's chain. Unreachable peers are skipped.
    pub async fn fetch_peer_chains(&self) -> Vec<PeerChain> {
        let outcomes = self
            .fan_out("fetch_chain", |client, peer| async move {
                client.fetch_chain(&peer).await
            })
            .await;

        let mut chains = Vec::with_capacity(outcomes.len());
        for (peer, result) in outcomes {
            match result {
                Ok(chain) => {
                    debug!(peer = peer.index, length = chain.length, "sync.chain_fetched");
                    self.record_chain(peer.index, chain.length).await;
                    chains.push(chain);
                }
                Err(e) => self.record_failure(peer.index, "fetch_chain", &e).await,
            }
        }
        chains
    }

    /// Send `tx` to every peer's `/broadcast`. Returns how many accepted it.
    pub async fn broadcast_transaction(&self, tx: &Transaction) -> usize {
        let outcomes = self
            .fan_out("broadcast", |client, peer| {
                let tx = tx.clone();
                async move { client.broadcast_transaction(&peer, &tx).await }
            })
            .await;

        let mut accepted = 0;
        for (peer, result) in outcomes {
            match result {
                Ok(()) => {
                    self.record_seen(peer.index).await;
                    accepted += 1;
                }
                Err(e @ ChainError::AuthenticationFailed(_)) => {
                    // The peer answered, it just disagreed.
                    self.record_seen(peer.index).await;
                    warn!(peer = peer.index, error = %e, "sync.broadcast_rejected");
                }
                Err(e) => self.record_failure(peer.index, "broadcast", &e).await,
            }
        }
        self.stats.write().await.transactions_broadcast += 1;
        accepted
    }

    /// Ask every peer to mine its own pending pool. Returns how many did.
    pub async fn request_mine(&self) -> usize {
        let outcomes = self
            .fan_out("mine", |client, peer| async move {
                client.request_mine(&peer).await
            })
            .await;

        let mut mined = 0;
        for (peer, result) in outcomes {
            match result {
                Ok(()) => {
                    self.record_seen(peer.index).await;
                    mined += 1;
                }
                Err(e) => self.record_failure(peer.index, "mine", &e).await,
            }
        }
        self.stats.write().await.mine_requests += 1;
        mined
    }
}
