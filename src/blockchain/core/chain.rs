use crate::blockchain::core::hashing::hash_block;
use crate::blockchain::core::validation::validate_chain;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;

/// Proof recorded in the genesis block.
pub const GENESIS_PROOF: u64 = 100;
/// Sentinel standing in for the genesis block's missing predecessor.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// Seconds since the Unix epoch at sealing. Informational only.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn hash(&self) -> String {
        hash_block(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1
    }
}

/// Wall-clock seconds with microsecond resolution.
pub fn current_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// The append-only chain plus the pool of transactions waiting for a block.
#[derive(Debug, Clone)]
pub struct Blockchain {
    // Never empty: the genesis block is pushed on construction and
    // `replace_chain` refuses empty chains.
    blocks: Vec<Block>,
    pub mempool: Mempool,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a chain holding only the genesis block.
    pub fn new() -> Self {
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            mempool: Mempool::new(),
        };
        blockchain.new_block(GENESIS_PROOF, Some(GENESIS_PREVIOUS_HASH.to_string()));
        blockchain
    }

    /// Adopt an existing chain, e.g. one received from a peer.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        let mut blockchain = Self::new();
        blockchain.replace_chain(blocks)?;
        Ok(blockchain)
    }

    /// Seal the pending pool into a new block and append it.
    ///
    /// `previous_hash` defaults to the hash of the current tip and the index
    /// follows the tip's. The pool is emptied in the same step, so every
    /// pending transaction lands in exactly this block.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.last_block().hash(),
        };

        let block = Block {
            index: self.blocks.last().map_or(1, |tip| tip.index.saturating_add(1)),
            timestamp: current_timestamp(),
            transactions: self.mempool.take_all(),
            proof,
            previous_hash,
        };

        self.blocks.push(block.clone());
        block
    }

    /// Queue an already authenticated transaction.
    ///
    /// Returns the index of the block that will hold it.
    pub fn new_transaction(&mut self, tx: Transaction) -> u64 {
        self.mempool.add_transaction(tx);
        self.last_block().index + 1
    }

    pub fn last_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.mempool.transactions()
    }

    /// Swap in `chain` wholesale. The pending pool is left as it is.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<(), ChainError> {
        if chain.is_empty() {
            return Err(ChainError::InvalidChain(
                "Cannot replace the chain with an empty chain".to_string(),
            ));
        }
        validate_chain(&chain)?;
        self.blocks = chain;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{proof_of_work, valid_proof};

    fn tx(owner: u64, receiver: u64) -> Transaction {
        Transaction {
            owner,
            receiver,
            amount: 5,
            drug_id: 42,
            h: 1,
            s0: 2,
            s1: 3,
        }
    }

    #[test]
    fn test_genesis_block() {
        let chain = Blockchain::new();
        assert_eq!(chain.len(), 1);
        let genesis = chain.last_block();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.is_genesis());
        assert!(genesis.timestamp > 0.0);
    }

    #[test]
    fn test_new_transaction_reports_next_index() {
        let mut chain = Blockchain::new();
        assert_eq!(chain.new_transaction(tx(5000, 5001)), 2);
        assert_eq!(chain.new_transaction(tx(5001, 5002)), 2);
        assert_eq!(chain.pending_transactions().len(), 2);
    }

    #[test]
    fn test_new_block_seals_pool_in_order() {
        let mut chain = Blockchain::new();
        chain.new_transaction(tx(5000, 5001));
        chain.new_transaction(tx(5001, 5002));

        let block = chain.new_block(12345, None);
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions, vec![tx(5000, 5001), tx(5001, 5002)]);
        assert!(chain.pending_transactions().is_empty());
        assert_eq!(chain.last_block(), &block);
    }

    #[test]
    fn test_previous_hash_defaults_to_tip_hash() {
        let mut chain = Blockchain::new();
        let genesis_hash = chain.last_block().hash();
        let block = chain.new_block(7, None);
        assert_eq!(block.previous_hash, genesis_hash);

        let explicit = chain.new_block(8, Some("abc".to_string()));
        assert_eq!(explicit.previous_hash, "abc");
        assert_eq!(explicit.index, 3);
    }

    #[test]
    fn test_mined_blocks_link_and_verify() {
        let mut chain = Blockchain::new();
        for _ in 0..2 {
            let last = chain.last_block().clone();
            let proof = proof_of_work(&last);
            let block = chain.new_block(proof, None);
            assert_eq!(block.previous_hash, last.hash());
            assert!(valid_proof(last.proof, block.proof, &block.previous_hash));
        }
        assert_eq!(chain.len(), 3);
        assert!(validate_chain(chain.blocks()).is_ok());
    }

    #[test]
    fn test_replace_chain_rejects_empty_and_invalid() {
        let mut chain = Blockchain::new();
        assert!(chain.replace_chain(vec![]).is_err());

        let mut forged = chain.blocks().to_vec();
        let mut bogus = forged[0].clone();
        bogus.index = 2;
        bogus.previous_hash = "not-a-hash".to_string();
        forged.push(bogus);
        assert!(chain.replace_chain(forged).is_err());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_replace_chain_rejects_chain_not_rooted_at_one() {
        let mut shifted = Blockchain::new();
        shifted.blocks[0].index = 5;
        let proof = proof_of_work(shifted.last_block());
        shifted.new_block(proof, None);
        assert_eq!(shifted.last_block().index, 6);

        let mut chain = Blockchain::new();
        assert!(chain.replace_chain(shifted.blocks().to_vec()).is_err());
        assert_eq!(chain.len(), 1);
        assert!(Blockchain::from_blocks(shifted.blocks().to_vec()).is_err());
    }

    #[test]
    fn test_new_block_index_follows_tip() {
        let mut chain = Blockchain::new();
        chain.blocks[0].index = 9;
        assert_eq!(chain.new_block(1, None).index, 10);
        assert_eq!(chain.new_block(2, None).index, 11);
    }

    #[test]
    fn test_replace_chain_keeps_pending_pool() {
        let mut other = Blockchain::new();
        let proof = proof_of_work(other.last_block());
        other.new_block(proof, None);

        let mut chain = Blockchain::new();
        chain.new_transaction(tx(5000, 5001));
        chain.replace_chain(other.blocks().to_vec()).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.pending_transactions(), &[tx(5000, 5001)]);
    }
}
