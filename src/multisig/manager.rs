//! Proposal manager
//!
//! Keeps the proposals of one vault while their approvals are collected.

use crate::core::CanonicalTransaction;
use crate::multisig::signature::Signature;
use crate::multisig::transaction::{PendingProposal, ProposalError, ProposalStatus};
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Proposals indexed by their vault transaction hash
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProposalManager {
    proposals: HashMap<B256, PendingProposal>,
}

impl ProposalManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a proposal; proposing the same hash twice returns the existing one
    pub fn propose(
        &mut self,
        transaction: CanonicalTransaction,
        hash: B256,
        threshold: usize,
    ) -> &PendingProposal {
        self.proposals
            .entry(hash)
            .or_insert_with(|| PendingProposal::new(transaction, hash, threshold))
    }

    pub fn get(&self, hash: &B256) -> Option<&PendingProposal> {
        self.proposals.get(hash)
    }

    pub fn get_mut(&mut self, hash: &B256) -> Option<&mut PendingProposal> {
        self.proposals.get_mut(hash)
    }

    /// Add an approval to a tracked proposal
    pub fn approve(
        &mut self,
        hash: &B256,
        signature: Signature,
        owners: &[Address],
    ) -> Result<&PendingProposal, ProposalError> {
        let proposal = self
            .proposals
            .get_mut(hash)
            .ok_or(ProposalError::NotFound(*hash))?;
        proposal.add_approval(signature, owners)?;
        Ok(proposal)
    }

    /// Proposals that can be executed now
    pub fn ready(&self) -> Vec<&PendingProposal> {
        self.proposals
            .values()
            .filter(|p| p.status == ProposalStatus::Ready)
            .collect()
    }

    pub fn list(&self) -> Vec<&PendingProposal> {
        self.proposals.values().collect()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Drop a proposal (after execution or when its nonce went stale)
    pub fn remove(&mut self, hash: &B256) -> Option<PendingProposal> {
        self.proposals.remove(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionTemplate;
    use crate::multisig::signature::approved_hash_signature;
    use alloy_primitives::{address, keccak256, U256};

    const A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

    fn transaction(nonce: u64) -> CanonicalTransaction {
        CanonicalTransaction::build(TransactionTemplate::new(B), U256::from(nonce))
    }

    #[test]
    fn test_propose_is_keyed_by_hash() {
        let mut manager = ProposalManager::new();
        let hash = keccak256(b"first");

        manager.propose(transaction(0), hash, 2);
        manager.propose(transaction(1), hash, 2);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(&hash).unwrap().transaction.nonce, U256::ZERO);
    }

    #[test]
    fn test_approve_and_list_ready() {
        let mut manager = ProposalManager::new();
        let first = keccak256(b"first");
        let second = keccak256(b"second");
        manager.propose(transaction(0), first, 1);
        manager.propose(transaction(1), second, 2);

        let proposal = manager
            .approve(&first, approved_hash_signature(A), &[A, B])
            .unwrap();
        assert!(proposal.is_ready());
        manager
            .approve(&second, approved_hash_signature(A), &[A, B])
            .unwrap();

        let ready = manager.ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].hash, first);
    }

    #[test]
    fn test_approve_unknown_proposal() {
        let mut manager = ProposalManager::new();
        let result = manager.approve(&B256::ZERO, approved_hash_signature(A), &[A]);
        assert!(matches!(result, Err(ProposalError::NotFound(_))));
    }

    #[test]
    fn test_remove() {
        let mut manager = ProposalManager::new();
        let hash = keccak256(b"first");
        manager.propose(transaction(0), hash, 1);

        assert!(manager.remove(&hash).is_some());
        assert!(manager.is_empty());
    }
}
