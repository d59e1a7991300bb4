//! Proposals awaiting owner approvals
//!
//! A proposal pairs a canonical transaction with the hash the vault
//! computed for it and collects one signature per owner until the
//! threshold is met.

use crate::client::TxId;
use crate::core::CanonicalTransaction;
use crate::crypto::{HashSigner, KeyError};
use crate::multisig::signature::{approved_hash_signature, encode_signatures, Signature, SignatureBundle};
use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while collecting approvals
#[derive(Error, Debug)]
pub enum ProposalError {
    #[error("Signer is not an owner: {0}")]
    Unauthorized(Address),
    #[error("Already approved by {0}")]
    AlreadyApproved(Address),
    #[error("Insufficient approvals: have {have}, need {need}")]
    InsufficientApprovals { have: usize, need: usize },
    #[error("Proposal not found: {0}")]
    NotFound(B256),
    #[error("Proposal already submitted as {0}")]
    AlreadySubmitted(TxId),
    #[error("Signing failed: {0}")]
    Signing(#[from] KeyError),
}

/// One owner's approval of a proposal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Approval {
    pub signature: Signature,
    pub approved_at: DateTime<Utc>,
}

impl Approval {
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            approved_at: Utc::now(),
        }
    }

    pub fn signer(&self) -> Address {
        self.signature.signer
    }
}

/// Status of a proposal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProposalStatus {
    /// Fewer approvals than the threshold
    AwaitingApprovals,
    /// Enough approvals to execute
    Ready,
    /// `execTransaction` was sent
    Submitted,
}

/// A transaction collecting approvals
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingProposal {
    /// Hash returned by the vault's `getTransactionHash`
    pub hash: B256,
    pub transaction: CanonicalTransaction,
    /// Approvals required, taken from the vault at proposal time
    pub threshold: usize,
    pub approvals: Vec<Approval>,
    pub status: ProposalStatus,
    pub submitted_tx: Option<TxId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingProposal {
    pub fn new(transaction: CanonicalTransaction, hash: B256, threshold: usize) -> Self {
        let now = Utc::now();
        Self {
            hash,
            transaction,
            threshold,
            approvals: Vec::new(),
            status: ProposalStatus::AwaitingApprovals,
            submitted_tx: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a signature from one of `owners`.
    ///
    /// Signatures are not verified here; the vault does that on execution.
    pub fn add_approval(
        &mut self,
        signature: Signature,
        owners: &[Address],
    ) -> Result<(), ProposalError> {
        if let Some(tx_id) = &self.submitted_tx {
            return Err(ProposalError::AlreadySubmitted(tx_id.clone()));
        }
        if !owners.contains(&signature.signer) {
            return Err(ProposalError::Unauthorized(signature.signer));
        }
        if self.approvals.iter().any(|a| a.signer() == signature.signer) {
            return Err(ProposalError::AlreadyApproved(signature.signer));
        }

        self.approvals.push(Approval::new(signature));
        self.updated_at = Utc::now();

        if self.approvals.len() >= self.threshold {
            self.status = ProposalStatus::Ready;
        }
        Ok(())
    }

    /// Sign the proposal hash off-chain and record the result
    pub fn sign_with<S: HashSigner>(
        &mut self,
        signer: &S,
        owners: &[Address],
    ) -> Result<(), ProposalError> {
        let signature = signer.sign_hash(&self.hash)?;
        self.add_approval(signature, owners)
    }

    /// Record an owner whose `approveHash` call for this hash is mined
    pub fn add_pre_approval(
        &mut self,
        owner: Address,
        owners: &[Address],
    ) -> Result<(), ProposalError> {
        self.add_approval(approved_hash_signature(owner), owners)
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    pub fn is_ready(&self) -> bool {
        self.approvals.len() >= self.threshold
    }

    pub fn approved_by(&self) -> Vec<Address> {
        self.approvals.iter().map(Approval::signer).collect()
    }

    /// Encode the collected approvals for `execTransaction`
    pub fn bundle(&self) -> Result<SignatureBundle, ProposalError> {
        if !self.is_ready() {
            return Err(ProposalError::InsufficientApprovals {
                have: self.approvals.len(),
                need: self.threshold,
            });
        }
        let signatures = self.approvals.iter().map(|a| a.signature.clone()).collect();
        Ok(encode_signatures(signatures))
    }

    pub fn mark_submitted(&mut self, tx_id: TxId) {
        self.submitted_tx = Some(tx_id);
        self.status = ProposalStatus::Submitted;
        self.updated_at = Utc::now();
    }
}
