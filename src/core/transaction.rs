//! Canonical vault transactions
//!
//! A vault transaction is the fully-defaulted tuple whose hash the owners
//! approve. Every field carries a concrete value before it is hashed or
//! executed: relayer refunds are not used, so the gas fields stay zero and
//! the refund addresses stay at the zero address.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Missing recipient address")]
    MissingRecipient,
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(u8),
}

// =============================================================================
// Operation
// =============================================================================

/// How the vault performs the inner call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Regular `CALL`
    #[default]
    Call,
    /// `DELEGATECALL` into the target
    DelegateCall,
}

impl Operation {
    /// Wire value used by the vault contract
    pub fn as_u8(self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }
}

impl TryFrom<u8> for Operation {
    type Error = TransactionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(TransactionError::InvalidOperation(other)),
        }
    }
}

// =============================================================================
// Template
// =============================================================================

/// Caller-supplied part of a proposal: `to` plus optional value and data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTemplate {
    pub to: Address,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub operation: Option<Operation>,
}

impl TransactionTemplate {
    pub fn new(to: Address) -> Self {
        Self {
            to,
            value: None,
            data: None,
            operation: None,
        }
    }

    /// Parse the recipient from a hex string (with or without `0x`)
    pub fn from_hex(to: &str) -> Result<Self, TransactionError> {
        let trimmed = to.trim();
        if trimmed.is_empty() || trimmed == "0x" {
            return Err(TransactionError::MissingRecipient);
        }
        let to = trimmed
            .parse::<Address>()
            .map_err(|_| TransactionError::InvalidRecipient(trimmed.to_string()))?;
        Ok(Self::new(to))
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }
}

// =============================================================================
// Canonical Transaction
// =============================================================================

/// The tuple hashed by `getTransactionHash` and submitted by `execTransaction`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: Operation,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    /// Zero address means the native currency
    pub gas_token: Address,
    /// Zero address means the transaction sender
    pub refund_receiver: Address,
    /// The vault nonce at proposal time
    pub nonce: U256,
}

impl CanonicalTransaction {
    /// Build a fully-defaulted transaction from a template and the current
    /// on-chain nonce
    pub fn build(template: TransactionTemplate, nonce: U256) -> Self {
        Self {
            to: template.to,
            value: template.value.unwrap_or(U256::ZERO),
            data: template.data.unwrap_or_default(),
            operation: template.operation.unwrap_or_default(),
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }

    /// Whether this transaction targets the vault itself (owner management)
    pub fn is_self_call(&self, vault: Address) -> bool {
        self.to == vault
    }
}
