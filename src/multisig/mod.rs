//! Multi-signature vault support
//!
//! A vault is a contract owned by N addresses that executes a transaction
//! once M of them approved its hash.
//!
//! # Example
//!
//! ```ignore
//! use multisig_vault::multisig::VaultSession;
//!
//! // Deploy and configure a 2-of-3 vault
//! let mut session = VaultSession::new(context, client, alice);
//! session.deploy().await?;
//! // ... once mined
//! session.resolve_address().await?;
//! session.setup(vec![alice, bob, carol], 2).await?;
//!
//! // Propose, approve, execute
//! let tx = session.propose_transaction(TransactionTemplate::new(dave).value(amount)).await?;
//! let hash = session.transaction_hash(&tx).await?;
//! session.approve_as(alice, hash).await?;
//! session.approve_as(bob, hash).await?;
//! // ... once mined
//! session.execute(&tx, &[alice, bob]).await?;
//! ```

pub mod abi;
pub mod factory;
pub mod manager;
pub mod owners;
pub mod signature;
pub mod transaction;
pub mod wallet;

pub use factory::Factory;
pub use manager::ProposalManager;
pub use owners::{previous_owner, SENTINEL_OWNERS};
pub use signature::{
    approved_hash_signature, encode_signatures, Signature, SignatureBundle, SignatureError,
    SIGNATURE_LENGTH_BYTES,
};
pub use transaction::{Approval, PendingProposal, ProposalError, ProposalStatus};
pub use wallet::{SessionState, VaultError, VaultSession};
