//! Base58Check account addresses
//!
//! Contracts and the client work with raw 20-byte addresses; users see
//! `Base58Check(version || hash160)` with a per-network version byte.

use crate::config::Network;
use alloy_primitives::Address;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Address conversion errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid base58: {0}")]
    InvalidBase58(String),
    #[error("Invalid address length: {0}")]
    InvalidLength(usize),
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error("Unknown version byte: {0:#04x}")]
    UnknownVersion(u8),
}

fn checksum(data: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// Render a 20-byte address for the given network
pub fn to_base58(address: Address, network: Network) -> String {
    let mut bytes = Vec::with_capacity(25);
    bytes.push(network.pubkey_hash_version());
    bytes.extend_from_slice(address.as_slice());
    let check = checksum(&bytes);
    bytes.extend_from_slice(&check);
    bs58::encode(bytes).into_string()
}

/// Parse a base58 address, returning the raw address and its network.
///
/// Testnet and regtest share a version byte; both decode as testnet.
pub fn from_base58(encoded: &str) -> Result<(Address, Network), AddressError> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
    if bytes.len() != 25 {
        return Err(AddressError::InvalidLength(bytes.len()));
    }

    let (payload, check) = bytes.split_at(21);
    if checksum(payload) != check {
        return Err(AddressError::ChecksumMismatch);
    }

    let network = match payload[0] {
        v if v == Network::Mainnet.pubkey_hash_version() => Network::Mainnet,
        v if v == Network::Testnet.pubkey_hash_version() => Network::Testnet,
        other => return Err(AddressError::UnknownVersion(other)),
    };
    Ok((Address::from_slice(&payload[1..]), network))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_testnet_prefix() {
        let encoded = to_base58(
            address!("b118e03f6575aa270673c8d86d6dcb07eb2d9221"),
            Network::Testnet,
        );
        assert!(encoded.starts_with('T'));
        assert_eq!(encoded.len(), 34);
    }

    #[test]
    fn test_mainnet_prefix() {
        let encoded = to_base58(
            address!("b118e03f6575aa270673c8d86d6dcb07eb2d9221"),
            Network::Mainnet,
        );
        assert!(encoded.starts_with('a'));
    }

    #[test]
    fn test_decode_recovers_address() {
        let raw = address!("3f25390b04e4d0a9f007195e2f57247ae15b78d4");
        let encoded = to_base58(raw, Network::Mainnet);
        assert_eq!(from_base58(&encoded).unwrap(), (raw, Network::Mainnet));
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let encoded = to_base58(
            address!("3f25390b04e4d0a9f007195e2f57247ae15b78d4"),
            Network::Testnet,
        );
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '1' { '2' } else { '1' };
        let corrupted: String = chars.into_iter().collect();

        assert_eq!(from_base58(&corrupted), Err(AddressError::ChecksumMismatch));
        assert!(matches!(from_base58("0OIl"), Err(AddressError::InvalidBase58(_))));
    }
}
