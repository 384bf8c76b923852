/// Validation logic for transactions separated from type definitions
use crate::crypto::IdentityTable;
use crate::error::ChainError;
use crate::transaction::types::{Transaction, TransactionRequest, REWARD_DRUG_ID};

impl TransactionRequest {
    /// Stateless checks applied before a proof is generated for the request.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.drug_id == REWARD_DRUG_ID {
            return Err(ChainError::InvalidInput(format!(
                "drug_id {} is reserved for mining rewards",
                REWARD_DRUG_ID
            )));
        }
        Ok(())
    }
}

impl Transaction {
    /// Maps the owner party id onto its identity-table index.
    ///
    /// Owners are numbered `owner_offset + node_index`; anything below the
    /// offset cannot belong to a configured node.
    pub fn owner_index(&self, owner_offset: u64) -> Result<u64, ChainError> {
        self.owner.checked_sub(owner_offset).ok_or_else(|| {
            ChainError::AuthenticationFailed(format!(
                "owner {} is below the owner offset {}",
                self.owner, owner_offset
            ))
        })
    }

    /// Checks the attached proof against the owner's identity parameters.
    pub fn authenticate(
        &self,
        identities: &IdentityTable,
        owner_offset: u64,
    ) -> Result<(), ChainError> {
        let index = self.owner_index(owner_offset)?;
        identities.authenticate(index, &self.proof())
    }
}
