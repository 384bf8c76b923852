use crate::blockchain::{Block, Blockchain};
use crate::config::Config;
use crate::crypto::{generate_proof, IdentityParams, IdentityTable};
use crate::error::{ChainError, Result};
use crate::miner::MiningTarget;
use crate::network::PeerClient;
use crate::sync::NodeSynchronizer;
use crate::transaction::{Transaction, TransactionRequest};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Result of accepting a client submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Index of the block the transaction will land in on this node.
    pub index: u64,
    /// Peers that accepted the broadcast.
    pub delivered: usize,
}

/// One ledger node: the chain, its identity and its view of the peers.
pub struct Node {
    config: Config,
    pub blockchain: Arc<RwLock<Blockchain>>,
    identities: IdentityTable,
    own_identity: IdentityParams,
    sync: NodeSynchronizer,
    /// Bumped on every chain replacement; a running proof search for an older
    /// epoch gives up.
    chain_epoch: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    blocks_mined: AtomicU64,
}

impl Node {
    pub fn new(config: Config) -> Result<Self> {
        let identities = config.identity_table()?;
        let own_identity = *identities.get(config.node.index)?;
        let client = PeerClient::new(&config.network)?;
        let sync = NodeSynchronizer::new(client, config.remote_peers());

        Ok(Self {
            config,
            blockchain: Arc::new(RwLock::new(Blockchain::new())),
            identities,
            own_identity,
            sync,
            chain_epoch: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            blocks_mined: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node_index(&self) -> u64 {
        self.config.node.index
    }

    pub fn synchronizer(&self) -> &NodeSynchronizer {
        &self.sync
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    pub fn chain_epoch(&self) -> u64 {
        self.chain_epoch.load(Ordering::SeqCst)
    }

    /// Stop accepting mining work; running searches abandon at their next poll.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Attach a proof built from this node's identity to a client request,
    /// accept it locally and hand it to every peer.
    pub async fn submit_transaction(&self, request: TransactionRequest) -> Result<SubmitOutcome> {
        request.validate()?;

        let proof = generate_proof(&self.own_identity, request.x, &mut rand::thread_rng());
        let tx = Transaction::new(&request, proof);

        let index = self.receive_transaction(tx.clone()).await?;
        let delivered = self.sync.broadcast_transaction(&tx).await;
        info!(
            owner = tx.owner,
            receiver = tx.receiver,
            drug_id = tx.drug_id,
            delivered,
            "Transaction submitted"
        );

        Ok(SubmitOutcome { index, delivered })
    }

    /// Authenticate a proof-carrying transaction and queue it.
    pub async fn receive_transaction(&self, tx: Transaction) -> Result<u64> {
        if let Err(e) = tx.authenticate(&self.identities, self.config.node.owner_offset) {
            warn!(owner = tx.owner, receiver = tx.receiver, error = %e, "Rejected transaction");
            return Err(e);
        }

        let index = self.blockchain.write().await.new_transaction(tx);
        debug!(index, "Transaction queued");
        Ok(index)
    }

    /// Mine the next block from the pending pool.
    ///
    /// The proof search runs on the blocking pool against a snapshot of the
    /// tip. If the tip moved by the time a proof is found, the result is
    /// thrown away and the search restarts, up to `mining.max_attempts` times.
    pub async fn mine(&self) -> Result<Block> {
        self.mine_with(|target, epoch| self.search_proof(target, epoch)).await
    }

    /// Run one proof search for `target`, abandoned on shutdown or once the
    /// chain epoch moves past `epoch`.
    async fn search_proof(&self, target: MiningTarget, epoch: u64) -> Result<Option<u64>> {
        let chain_epoch = self.chain_epoch.clone();
        let shutdown = self.shutdown.clone();
        tokio::task::spawn_blocking(move || {
            target.mine(|| {
                shutdown.load(Ordering::Relaxed) || chain_epoch.load(Ordering::Relaxed) != epoch
            })
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Mining task failed");
            ChainError::MiningCancelled
        })
    }

    /// Mining loop around an arbitrary proof search.
    ///
    /// `search` receives the tip snapshot and the chain epoch it was taken
    /// in, and yields `None` when it gave up.
    async fn mine_with<F, Fut>(&self, mut search: F) -> Result<Block>
    where
        F: FnMut(MiningTarget, u64) -> Fut,
        Fut: Future<Output = Result<Option<u64>>>,
    {
        let max_attempts = self.config.mining.max_attempts;

        for attempt in 1..=max_attempts {
            if self.is_shutting_down() {
                return Err(ChainError::MiningCancelled);
            }

            let (target, epoch) = {
                let chain = self.blockchain.read().await;
                (
                    MiningTarget::from_block(chain.last_block()),
                    self.chain_epoch.load(Ordering::SeqCst),
                )
            };

            let Some(proof) = search(target.clone(), epoch).await? else {
                if self.is_shutting_down() {
                    return Err(ChainError::MiningCancelled);
                }
                debug!(attempt, "Chain replaced during proof search, restarting");
                continue;
            };

            let mut chain = self.blockchain.write().await;
            if !target.matches(chain.last_block()) {
                debug!(attempt, "Chain tip moved during proof search, restarting");
                continue;
            }
            let block = chain.new_block(proof, Some(target.hash));
            drop(chain);

            self.blocks_mined.fetch_add(1, Ordering::Relaxed);
            info!(
                index = block.index,
                proof = block.proof,
                transactions = block.transactions.len(),
                "New block forged"
            );
            return Ok(block);
        }

        Err(ChainError::MiningRace(max_attempts))
    }

    /// Ask every peer to mine, then mine locally. Returns the local block and
    /// how many peers answered.
    pub async fn mine_with_peers(&self) -> Result<(Block, usize)> {
        let notified = self.sync.request_mine().await;
        let block = self.mine().await?;
        Ok((block, notified))
    }

    /// Fetch every peer's chain and adopt the longest valid one if it beats
    /// ours.
    pub async fn resolve_conflicts(&self) -> bool {
        let candidates = self.sync.fetch_peer_chains().await;
        let mut chain = self.blockchain.write().await;
        let replaced = chain.resolve_conflicts(candidates);
        if replaced {
            self.chain_epoch.fetch_add(1, Ordering::SeqCst);
        }
        replaced
    }

    /// Serve the HTTP API until ctrl-c, resolving conflicts in the background
    /// when an interval is configured.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(
            index = self.node_index(),
            party = self.config.own_party_id(),
            peers = self.sync.peer_count(),
            "Starting ChainDrug node"
        );

        if let Some(interval) = self.config.network.resolve_interval() {
            let node = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick fires immediately; give peers a moment to boot.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if node.is_shutting_down() {
                        break;
                    }
                    if node.resolve_conflicts().await {
                        let length = node.blockchain.read().await.len();
                        info!(length, "Chain replaced by periodic resolution");
                    }
                }
            });
        }

        crate::api::run_api_server(self).await
    }
}
