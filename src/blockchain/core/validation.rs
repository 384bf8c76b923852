use crate::blockchain::core::chain::Block;
use crate::error::ChainError;
use crate::miner::valid_proof;

/// Walks every adjacent pair of `chain` and reports the first broken link.
///
/// A non-empty chain must start at index 1. A block is linked to its
/// predecessor when its index follows on, its `previous_hash` equals the
/// predecessor's canonical hash and its proof solves the puzzle for
/// `(predecessor.proof, previous_hash)`. The empty chain is valid.
///
/// The proof is checked against the block's own `previous_hash`, which is the
/// value the miner searched against. Nodes that check it against the
/// predecessor's `previous_hash` instead will reject chains built here.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    if let Some(first) = chain.first() {
        if first.index != 1 {
            return Err(ChainError::InvalidChain(format!(
                "Chain starts at index {} instead of 1",
                first.index
            )));
        }
    }

    for pair in chain.windows(2) {
        let (last_block, block) = (&pair[0], &pair[1]);

        if last_block.index.checked_add(1) != Some(block.index) {
            return Err(ChainError::InvalidChain(format!(
                "Block index {} does not follow {}",
                block.index, last_block.index
            )));
        }

        let expected_hash = last_block.hash();
        if block.previous_hash != expected_hash {
            return Err(ChainError::InvalidChain(format!(
                "Block {} previous_hash {} does not match hash of block {} ({})",
                block.index, block.previous_hash, last_block.index, expected_hash
            )));
        }

        if !valid_proof(last_block.proof, block.proof, &block.previous_hash) {
            return Err(ChainError::InvalidChain(format!(
                "Block {} has an invalid proof of work ({})",
                block.index, block.proof
            )));
        }
    }
    Ok(())
}

pub fn valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}
