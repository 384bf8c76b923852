/// Transaction types for ChainDrug
use crate::crypto::ProofFields;

/// Drug id reserved for mining-reward transactions.
pub const REWARD_DRUG_ID: u64 = 0;

/// A custody transfer as it is stored in the pending pool and in blocks.
///
/// The proof fields `h`, `s0` and `s1` are produced by the submitting node
/// and carried verbatim from then on; nothing downstream re-derives them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub owner: u64,
    pub receiver: u64,
    pub amount: u64,
    pub drug_id: u64,
    pub h: u64,
    pub s0: u64,
    pub s1: u64,
}

impl Transaction {
    pub fn new(request: &TransactionRequest, proof: ProofFields) -> Self {
        Transaction {
            owner: request.owner,
            receiver: request.receiver,
            amount: request.amount,
            drug_id: request.drug_id,
            h: proof.h,
            s0: proof.s0,
            s1: proof.s1,
        }
    }

    pub fn proof(&self) -> ProofFields {
        ProofFields {
            h: self.h,
            s0: self.s0,
            s1: self.s1,
        }
    }

    /// True when `party` is either side of the transfer.
    pub fn involves(&self, party: u64) -> bool {
        self.owner == party || self.receiver == party
    }
}

/// A transfer as submitted by a client, before any proof is attached.
///
/// `x` is the client's challenge; it is consumed by proof generation and never
/// stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionRequest {
    pub owner: u64,
    pub receiver: u64,
    pub amount: u64,
    pub drug_id: u64,
    pub x: u64,
}
