//! Proof-of-work for ChainDrug
//!
//! A proof `p` is valid for the previous block when
//! `sha256("{last_proof}{p}{last_hash}")` starts with [`DIFFICULTY`] zero hex
//! digits. Difficulty is fixed; there is no retargeting.

use crate::blockchain::Block;
use sha2::{Digest, Sha256};

/// Number of leading `'0'` hex digits a proof hash must have.
pub const DIFFICULTY: usize = 4;

/// How many candidates are tried between two polls of the stop signal.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

fn leading_zero_nibbles(digest: &[u8]) -> usize {
    let mut zeros = 0;
    for byte in digest {
        if *byte == 0 {
            zeros += 2;
        } else {
            if byte >> 4 == 0 {
                zeros += 1;
            }
            break;
        }
    }
    zeros
}

pub fn valid_proof(last_proof: u64, proof: u64, last_hash: &str) -> bool {
    let guess = format!("{}{}{}", last_proof, proof, last_hash);
    let digest = Sha256::digest(guess.as_bytes());
    leading_zero_nibbles(&digest) >= DIFFICULTY
}

/// First proof, counting up from zero, that solves the puzzle for `last_block`.
pub fn proof_of_work(last_block: &Block) -> u64 {
    let last_hash = last_block.hash();
    let mut proof = 0;
    while !valid_proof(last_block.proof, proof, &last_hash) {
        proof += 1;
    }
    proof
}

/// Same search as [`proof_of_work`], abandoned once `should_stop` returns true.
///
/// The predicate is polled every [`CANCEL_CHECK_INTERVAL`] candidates.
pub fn proof_of_work_until<F>(last_proof: u64, last_hash: &str, should_stop: F) -> Option<u64>
where
    F: Fn() -> bool,
{
    let mut proof = 0u64;
    loop {
        if proof % CANCEL_CHECK_INTERVAL == 0 && should_stop() {
            return None;
        }
        if valid_proof(last_proof, proof, last_hash) {
            return Some(proof);
        }
        proof = proof.checked_add(1)?;
    }
}

/// Snapshot of the chain tip that a mining attempt works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningTarget {
    pub index: u64,
    pub proof: u64,
    pub hash: String,
}

impl MiningTarget {
    pub fn from_block(block: &Block) -> Self {
        Self {
            index: block.index,
            proof: block.proof,
            hash: block.hash(),
        }
    }

    pub fn mine<F>(&self, should_stop: F) -> Option<u64>
    where
        F: Fn() -> bool,
    {
        proof_of_work_until(self.proof, &self.hash, should_stop)
    }

    /// True while `block` is still the tip this target was taken from.
    pub fn matches(&self, block: &Block) -> bool {
        self.index == block.index && self.hash == block.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;
    use std::cell::Cell;

    const GENESIS_HASH: &str = "7dd0b05c7a6aafba30a3d6c7102d235385a934972e4c066bcea9f6adcbae98f2";

    #[test]
    fn test_leading_zero_nibbles() {
        assert_eq!(leading_zero_nibbles(&[0x00, 0x00, 0x1f]), 5);
        assert_eq!(leading_zero_nibbles(&[0x00, 0x0a]), 3);
        assert_eq!(leading_zero_nibbles(&[0x10]), 0);
        assert_eq!(leading_zero_nibbles(&[0x00, 0x00, 0x00]), 6);
    }

    #[test]
    fn test_valid_proof_is_deterministic() {
        for proof in [0u64, 1, 3336, 99_999] {
            let first = valid_proof(100, proof, GENESIS_HASH);
            for _ in 0..5 {
                assert_eq!(valid_proof(100, proof, GENESIS_HASH), first);
            }
        }
    }

    #[test]
    fn test_first_proof_matches_python_nodes() {
        // First proof accepted by the Python nodes after the fixed genesis
        // block (proof 100, timestamp 1700000000.5).
        assert!(valid_proof(100, 3336, GENESIS_HASH));
        assert_eq!(proof_of_work_until(100, GENESIS_HASH, || false), Some(3336));
    }

    #[test]
    fn test_proof_of_work_solves_last_block() {
        let chain = Blockchain::new();
        let last = chain.last_block();
        let last_hash = last.hash();
        let proof = proof_of_work(last);
        assert!(valid_proof(last.proof, proof, &last_hash));
        // It is also the smallest solution.
        assert!((0..proof).all(|p| !valid_proof(last.proof, p, &last_hash)));
    }

    #[test]
    fn test_stop_signal_abandons_search() {
        assert_eq!(proof_of_work_until(100, GENESIS_HASH, || true), None);

        // Stop on the second poll: the search gets exactly one interval.
        let polls = Cell::new(0);
        let result = proof_of_work_until(100, "never-solved-quickly", || {
            polls.set(polls.get() + 1);
            polls.get() > 1
        });
        if let Some(proof) = result {
            assert!(proof < CANCEL_CHECK_INTERVAL);
        }
        assert!(polls.get() <= 2);
    }

    #[test]
    fn test_mining_target_tracks_tip() {
        let mut chain = Blockchain::new();
        let target = MiningTarget::from_block(chain.last_block());
        assert!(target.matches(chain.last_block()));

        let proof = target.mine(|| false).unwrap();
        chain.new_block(proof, None);
        assert!(!target.matches(chain.last_block()));
    }
}
