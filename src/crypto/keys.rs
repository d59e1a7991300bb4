//! ECDSA key management for off-chain approvals
//!
//! Provides key pair generation and recoverable signing over the
//! secp256k1 curve. A key has two addresses:
//! - the account address, `RIPEMD160(SHA256(compressed pubkey))`, used as
//!   the sender of transactions
//! - the recovery address, the last 20 bytes of `keccak256(pubkey)`, which
//!   is what the vault's `ecrecover` yields for an off-chain signature

use crate::multisig::Signature;
use alloy_primitives::{keccak256, Address, B256};
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Offset added to the recovery id in the `v` byte
pub const RECOVERY_ID_OFFSET: u8 = 27;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Something that can produce an owner signature over a vault hash
pub trait HashSigner {
    /// Address the vault will attribute the signature to
    fn signer_address(&self) -> Address;

    fn sign_hash(&self, hash: &B256) -> Result<Signature, KeyError>;
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Account address (hash160 of the compressed public key)
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Address recovered by the vault from this key's signatures
    pub fn recovery_address(&self) -> Address {
        public_key_to_recovery_address(&self.public_key)
    }

    /// Sign a 32-byte hash, returning `r‖s‖v`
    pub fn sign(&self, hash: &B256) -> Result<[u8; 65], KeyError> {
        sign_hash(&self.secret_key, hash)
    }
}

impl HashSigner for KeyPair {
    fn signer_address(&self) -> Address {
        self.recovery_address()
    }

    fn sign_hash(&self, hash: &B256) -> Result<Signature, KeyError> {
        let raw = self.sign(hash)?;
        Signature::fixed(self.recovery_address(), raw.to_vec())
            .map_err(|_| KeyError::InvalidSignature)
    }
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd.finalize());
    out
}

/// Convert a public key to its account address
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    Address::from(hash160(&public_key.serialize()))
}

/// Convert a public key to the address `ecrecover` returns for it
pub fn public_key_to_recovery_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    Address::from_word(keccak256(&uncompressed[1..]))
}

/// Sign a hash with a secret key, returning `r‖s‖v` with `v` in {27, 28}
pub fn sign_hash(secret_key: &SecretKey, hash: &B256) -> Result<[u8; 65], KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(hash.as_slice())?;
    let signature = secp.sign_ecdsa_recoverable(&message, secret_key);
    let (recovery_id, compact) = signature.serialize_compact();

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&compact);
    out[64] = RECOVERY_ID_OFFSET + recovery_id.to_i32() as u8;
    Ok(out)
}

/// Recover the signer's recovery address from an `r‖s‖v` signature
pub fn recover_signer(hash: &B256, signature: &[u8]) -> Result<Address, KeyError> {
    if signature.len() != 65 {
        return Err(KeyError::InvalidSignature);
    }
    let v = signature[64];
    if !(RECOVERY_ID_OFFSET..=RECOVERY_ID_OFFSET + 1).contains(&v) {
        return Err(KeyError::InvalidSignature);
    }

    let secp = Secp256k1::new();
    let recovery_id = RecoveryId::from_i32(i32::from(v - RECOVERY_ID_OFFSET))?;
    let signature = RecoverableSignature::from_compact(&signature[..64], recovery_id)?;
    let message = Message::from_digest_slice(hash.as_slice())?;
    let public_key = secp.recover_ecdsa(&message, &signature)?;
    Ok(public_key_to_recovery_address(&public_key))
}
