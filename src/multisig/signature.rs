//! Owner signatures and the aggregated signature bundle
//!
//! The vault verifies one byte string per execution. Signatures are laid
//! out in ascending signer order as fixed 65-byte entries, followed by a
//! dynamic region holding length-prefixed payloads of contract signers:
//!
//! ```text
//! static entry (ECDSA / pre-approval): {65 bytes of signature data}
//! static entry (dynamic signer):       {32: signer}{32: offset}{1: 0x00}
//! dynamic entry:                       {32: payload length}{payload}
//! ```
//!
//! Offsets are measured from the start of the static region.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size of one static entry
pub const SIGNATURE_LENGTH_BYTES: usize = 65;

/// Signature type byte of a contract (dynamic) signature
pub const CONTRACT_SIGNATURE_TYPE: u8 = 0;

/// Signature type byte of a pre-approved hash
pub const APPROVED_HASH_SIGNATURE_TYPE: u8 = 1;

/// Signature errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid signature length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Invalid signer address: {0}")]
    InvalidSigner(String),
}

/// One owner's approval of a transaction hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signer: Address,
    pub data: Bytes,
    /// Contract signer whose payload goes to the dynamic region
    pub dynamic: bool,
}

impl Signature {
    /// A fixed-size 65-byte signature (ECDSA `r‖s‖v` or pre-approval)
    pub fn fixed(signer: Address, data: impl Into<Bytes>) -> Result<Self, SignatureError> {
        let data = data.into();
        if data.len() != SIGNATURE_LENGTH_BYTES {
            return Err(SignatureError::InvalidLength {
                expected: SIGNATURE_LENGTH_BYTES,
                actual: data.len(),
            });
        }
        Ok(Self {
            signer,
            data,
            dynamic: false,
        })
    }

    /// A variable-length payload checked by a contract signer
    pub fn dynamic(signer: Address, data: impl Into<Bytes>) -> Self {
        Self {
            signer,
            data: data.into(),
            dynamic: true,
        }
    }

    /// Parse `signer` and hex `data` (both with or without `0x`)
    pub fn from_hex(signer: &str, data: &str, dynamic: bool) -> Result<Self, SignatureError> {
        let signer = signer
            .trim()
            .parse::<Address>()
            .map_err(|_| SignatureError::InvalidSigner(signer.to_string()))?;
        let raw = data.trim().trim_start_matches("0x");
        let bytes = hex::decode(raw).map_err(|e| SignatureError::InvalidHex(e.to_string()))?;
        if dynamic {
            Ok(Self::dynamic(signer, bytes))
        } else {
            Self::fixed(signer, bytes)
        }
    }

    /// Signature type byte (last byte of the static entry)
    pub fn signature_type(&self) -> u8 {
        if self.dynamic {
            CONTRACT_SIGNATURE_TYPE
        } else {
            self.data.last().copied().unwrap_or_default()
        }
    }
}

/// Pre-approval signature for an owner that called `approveHash`.
///
/// `{32: signer}{32: zero}{1: 0x01}`; the vault looks up its approval
/// table instead of recovering a key.
pub fn approved_hash_signature(signer: Address) -> Signature {
    let mut data = Vec::with_capacity(SIGNATURE_LENGTH_BYTES);
    data.extend_from_slice(signer.into_word().as_slice());
    data.extend_from_slice(B256::ZERO.as_slice());
    data.push(APPROVED_HASH_SIGNATURE_TYPE);
    Signature {
        signer,
        data: data.into(),
        dynamic: false,
    }
}

/// The encoded byte string submitted with `execTransaction`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBundle(Bytes);

impl SignatureBundle {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Display for SignatureBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Sort signatures by signer and pack them into a bundle.
///
/// Threshold is not checked here, and duplicate signers are kept.
pub fn encode_signatures(mut signatures: Vec<Signature>) -> SignatureBundle {
    // Byte order of an address equals lowercase hex order.
    signatures.sort_by(|left, right| left.signer.cmp(&right.signer));

    let static_len = signatures.len() * SIGNATURE_LENGTH_BYTES;
    let mut static_part = Vec::with_capacity(static_len);
    let mut dynamic_part = Vec::new();

    for sig in &signatures {
        if sig.dynamic {
            let offset = U256::from(static_len + dynamic_part.len());
            static_part.extend_from_slice(sig.signer.into_word().as_slice());
            static_part.extend_from_slice(&offset.to_be_bytes::<32>());
            static_part.push(CONTRACT_SIGNATURE_TYPE);

            dynamic_part.extend_from_slice(&U256::from(sig.data.len()).to_be_bytes::<32>());
            dynamic_part.extend_from_slice(&sig.data);
        } else {
            static_part.extend_from_slice(&sig.data);
        }
    }

    static_part.extend_from_slice(&dynamic_part);
    SignatureBundle(static_part.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const A: Address = address!("1000000000000000000000000000000000000001");
    const B: Address = address!("2000000000000000000000000000000000000002");
    const C: Address = address!("b118e03f6575aa270673c8d86d6dcb07eb2d9221");

    fn ecdsa_like(fill: u8) -> Vec<u8> {
        let mut data = vec![fill; 64];
        data.push(27);
        data
    }

    #[test]
    fn test_approved_hash_signature_layout() {
        let sig = approved_hash_signature(C);
        assert_eq!(
            format!("0x{}", hex::encode(&sig.data)),
            format!(
                "0x000000000000000000000000{}{}01",
                "b118e03f6575aa270673c8d86d6dcb07eb2d9221",
                "0".repeat(64)
            )
        );
        assert_eq!(sig.signer, C);
        assert!(!sig.dynamic);
        assert_eq!(sig.signature_type(), APPROVED_HASH_SIGNATURE_TYPE);
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = encode_signatures(vec![]);
        assert!(bundle.is_empty());
        assert_eq!(bundle.to_hex(), "0x");
    }

    #[test]
    fn test_static_bundle_sorted_and_sized() {
        let sigs = vec![
            approved_hash_signature(C),
            Signature::fixed(B, ecdsa_like(0xbb)).unwrap(),
            approved_hash_signature(A),
        ];
        let bundle = encode_signatures(sigs);

        assert_eq!(bundle.to_hex().len(), 2 + 130 * 3);
        let bytes = bundle.as_bytes();
        assert_eq!(&bytes[12..32], A.as_slice());
        assert_eq!(&bytes[65..129], &[0xbb; 64][..]);
        assert_eq!(&bytes[130 + 12..130 + 32], C.as_slice());
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let forward = encode_signatures(vec![approved_hash_signature(A), approved_hash_signature(C)]);
        let reverse = encode_signatures(vec![approved_hash_signature(C), approved_hash_signature(A)]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_sort_is_case_insensitive_hex_order() {
        // 0xB1... must sort after 0x2... and 0x1...
        let mixed = "0xB118E03F6575AA270673C8D86D6DCB07EB2D9221";
        let upper = Signature::from_hex(mixed, &hex::encode(ecdsa_like(1)), false).unwrap();
        let bundle = encode_signatures(vec![upper, approved_hash_signature(B)]);
        assert_eq!(&bundle.as_bytes()[12..32], B.as_slice());
    }

    #[test]
    fn test_single_dynamic_signature() {
        let payload = vec![0xaa; 10];
        let bundle = encode_signatures(vec![Signature::dynamic(A, payload.clone())]);
        let bytes = bundle.as_bytes();

        assert_eq!(bytes.len(), 65 + 32 + payload.len());
        assert_eq!(&bytes[12..32], A.as_slice());
        assert_eq!(U256::from_be_slice(&bytes[32..64]), U256::from(65));
        assert_eq!(bytes[64], CONTRACT_SIGNATURE_TYPE);
        assert_eq!(U256::from_be_slice(&bytes[65..97]), U256::from(10));
        assert_eq!(&bytes[97..], payload.as_slice());
    }

    #[test]
    fn test_dynamic_offsets_accumulate() {
        let first = vec![0x11; 3];
        let second = vec![0x22; 40];
        let bundle = encode_signatures(vec![
            Signature::dynamic(C, second.clone()),
            approved_hash_signature(B),
            Signature::dynamic(A, first.clone()),
        ]);
        let bytes = bundle.as_bytes();
        let static_len = 3 * 65;

        // A (first sorted) points at the start of the dynamic region
        assert_eq!(U256::from_be_slice(&bytes[32..64]), U256::from(static_len));
        // C points past A's length word and payload
        let c_entry = 2 * 65;
        assert_eq!(
            U256::from_be_slice(&bytes[c_entry + 32..c_entry + 64]),
            U256::from(static_len + 32 + first.len())
        );
        assert_eq!(bytes.len(), static_len + 32 + first.len() + 32 + second.len());
        assert_eq!(&bytes[static_len + 32..static_len + 35], first.as_slice());
    }

    #[test]
    fn test_fixed_signature_length_checked() {
        assert_eq!(
            Signature::fixed(A, vec![0u8; 64]),
            Err(SignatureError::InvalidLength {
                expected: 65,
                actual: 64
            })
        );
    }

    #[test]
    fn test_from_hex_rejects_odd_digits() {
        let result = Signature::from_hex("0x1000000000000000000000000000000000000001", "0xabc", true);
        assert!(matches!(result, Err(SignatureError::InvalidHex(_))));
    }
}
