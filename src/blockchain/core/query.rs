//! Read-only lookups over the chain.
//!
//! Plain linear scans; no index is kept alongside the blocks.

use crate::blockchain::core::chain::Blockchain;
use crate::transaction::Transaction;

impl Blockchain {
    /// Every sealed transaction where `party` is owner or receiver, in
    /// chain order and, within a block, in insertion order.
    pub fn transactions_for(&self, party: u64) -> Vec<Transaction> {
        self.blocks()
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.involves(party))
            .cloned()
            .collect()
    }

    /// Like [`Blockchain::transactions_for`] but over the pending pool.
    pub fn pending_transactions_for(&self, party: u64) -> Vec<Transaction> {
        self.pending_transactions()
            .iter()
            .filter(|tx| tx.involves(party))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::blockchain::Blockchain;
    use crate::transaction::Transaction;

    fn tx(owner: u64, receiver: u64, amount: u64) -> Transaction {
        Transaction {
            owner,
            receiver,
            amount,
            drug_id: 11,
            h: 0,
            s0: 0,
            s1: 0,
        }
    }

    // Query does not re-validate, so blocks are sealed with arbitrary proofs.
    fn seal(chain: &mut Blockchain, txs: Vec<Transaction>) {
        for t in txs {
            chain.new_transaction(t);
        }
        chain.new_block(0, None);
    }

    #[test]
    fn test_unknown_party_has_no_transactions() {
        let mut chain = Blockchain::new();
        seal(&mut chain, vec![tx(5000, 5001, 1)]);
        assert!(chain.transactions_for(9999).is_empty());
    }

    #[test]
    fn test_transactions_returned_in_chain_order() {
        let mut chain = Blockchain::new();
        // Block 2: party 7 is the owner.
        seal(&mut chain, vec![tx(7, 8, 1), tx(1, 2, 2)]);
        seal(&mut chain, vec![tx(3, 4, 3)]);
        seal(&mut chain, vec![]);
        // Block 5: party 7 is the receiver, twice.
        seal(&mut chain, vec![tx(9, 7, 4), tx(5, 6, 5), tx(8, 7, 6)]);
        assert_eq!(chain.len(), 5);

        let found = chain.transactions_for(7);
        let amounts: Vec<u64> = found.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![1, 4, 6]);
    }

    #[test]
    fn test_self_transfer_listed_once() {
        let mut chain = Blockchain::new();
        seal(&mut chain, vec![tx(7, 7, 1)]);
        assert_eq!(chain.transactions_for(7).len(), 1);
    }

    #[test]
    fn test_pending_transactions_not_in_chain_query() {
        let mut chain = Blockchain::new();
        chain.new_transaction(tx(7, 8, 1));
        assert!(chain.transactions_for(7).is_empty());
        assert_eq!(chain.pending_transactions_for(7).len(), 1);
        assert!(chain.pending_transactions_for(9).is_empty());
    }
}
