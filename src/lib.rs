//! Multisig Vault: a client library for threshold-signature vault contracts
//!
//! This crate provides:
//! - Canonical vault transactions and their defaulting rules
//! - The signature bundle format verified by the vault contract
//! - A vault session driving deploy, setup, approve and execute
//! - Owner list navigation for add/remove owner proposals
//! - Off-chain ECDSA signing of vault transaction hashes
//! - A deterministic in-memory chain for local runs and tests
//!
//! # Example
//!
//! ```rust
//! use multisig_vault::multisig::{approved_hash_signature, encode_signatures};
//! use alloy_primitives::address;
//!
//! let bundle = encode_signatures(vec![
//!     approved_hash_signature(address!("2000000000000000000000000000000000000002")),
//!     approved_hash_signature(address!("1000000000000000000000000000000000000001")),
//! ]);
//! assert_eq!(bundle.len(), 130);
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod crypto;
pub mod multisig;

// Re-export commonly used types
pub use client::{ChainClient, InMemoryChain, Receipt, TxId};
pub use config::{Context, Network};
pub use core::{CanonicalTransaction, TransactionTemplate};
pub use crypto::{HashSigner, KeyPair};
pub use multisig::{
    encode_signatures, previous_owner, Signature, SignatureBundle, VaultError, VaultSession,
};
