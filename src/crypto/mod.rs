//! Cryptographic utilities
//!
//! This module provides:
//! - ECDSA key management and hash signing (secp256k1)
//! - Base58Check rendering of account addresses

pub mod address;
pub mod keys;

pub use address::{from_base58, to_base58, AddressError};
pub use keys::{
    hash160, public_key_to_address, public_key_to_recovery_address, recover_signer, sign_hash,
    HashSigner, KeyError, KeyPair,
};
