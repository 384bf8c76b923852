//! Longest-valid-chain conflict resolution
//!
//! A node compares its chain with the chains reported by its peers and adopts
//! the longest one that validates. Length is the only weight; there is no
//! work or stake accounting.

use crate::blockchain::{valid_chain, Block, Blockchain};
use tracing::{debug, info};

/// A chain as served by a peer's `/chain` endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PeerChain {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl PeerChain {
    pub fn from_blocks(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// Consensus engine for selecting the canonical chain
pub struct Consensus;

impl Consensus {
    /// Pick the longest valid candidate that beats `local_len`.
    ///
    /// Candidates are scanned in order and only a strictly longer chain
    /// displaces the current best, so the first of several equally long
    /// chains wins. A candidate whose reported `length` disagrees with the
    /// blocks it carries is skipped.
    pub fn select_longest_valid(
        local_len: usize,
        candidates: impl IntoIterator<Item = PeerChain>,
    ) -> Option<Vec<Block>> {
        let mut max_length = local_len;
        let mut best = None;

        for candidate in candidates {
            if candidate.length != candidate.chain.len() {
                debug!(
                    reported = candidate.length,
                    actual = candidate.chain.len(),
                    "consensus.length_mismatch"
                );
                continue;
            }
            if candidate.length <= max_length {
                continue;
            }
            if !valid_chain(&candidate.chain) {
                debug!(length = candidate.length, "consensus.invalid_candidate");
                continue;
            }
            max_length = candidate.length;
            best = Some(candidate.chain);
        }

        best
    }
}

impl Blockchain {
    /// Replace the local chain with the best candidate, if any beats it.
    ///
    /// Returns whether the chain was replaced. The local chain is never
    /// shortened and never swapped for an invalid one.
    pub fn resolve_conflicts(&mut self, candidates: impl IntoIterator<Item = PeerChain>) -> bool {
        let local_len = self.len();
        match Consensus::select_longest_valid(local_len, candidates) {
            Some(chain) => {
                let new_len = chain.len();
                match self.replace_chain(chain) {
                    Ok(()) => {
                        info!(from = local_len, to = new_len, "Adopted longer chain from peer");
                        true
                    }
                    Err(e) => {
                        debug!("Candidate chain rejected on replace: {}", e);
                        false
                    }
                }
            }
            None => false,
        }
    }
}
