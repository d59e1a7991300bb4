//! Chain client interface
//!
//! The vault library never talks to a node directly. It needs four things
//! from a client:
//! - a read-only contract call returning raw ABI return data
//! - a state-changing send returning a transaction id (not a receipt)
//! - a receipt lookup, empty while the transaction is unmined
//! - a native balance lookup
//!
//! Contract creation is a send without a target (`SendRequest::deploy`).

pub mod memory;

pub use memory::{ContractKind, InMemoryChain};

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Call reverted: {0}")]
    CallReverted(String),
    #[error("No contract at {0}")]
    UnknownContract(Address),
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TxId),
}

/// Transaction identifier returned by a send
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxId {
    fn from(value: &str) -> Self {
        TxId(value.to_string())
    }
}

/// Per-send overrides
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    /// Native value attached to the send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

impl TxOptions {
    /// Fill unset fields from `defaults`
    pub fn or(self, defaults: &TxOptions) -> TxOptions {
        TxOptions {
            gas_limit: self.gas_limit.or(defaults.gas_limit),
            gas_price: self.gas_price.or(defaults.gas_price),
            value: self.value.or(defaults.value),
        }
    }
}

/// A state-changing submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendRequest {
    pub from: Address,
    /// `None` creates a contract from `data`
    pub to: Option<Address>,
    pub data: Bytes,
    pub options: TxOptions,
}

impl SendRequest {
    pub fn call(from: Address, to: Address, data: impl Into<Bytes>, options: TxOptions) -> Self {
        Self {
            from,
            to: Some(to),
            data: data.into(),
            options,
        }
    }

    pub fn deploy(from: Address, bytecode: impl Into<Bytes>, options: TxOptions) -> Self {
        Self {
            from,
            to: None,
            data: bytecode.into(),
            options,
        }
    }

    pub fn is_deploy(&self) -> bool {
        self.to.is_none()
    }
}

/// Execution status of one receipt result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecStatus {
    /// Executed without exception
    None,
    Revert,
    Other(String),
}

impl From<String> for ExecStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "None" => ExecStatus::None,
            "Revert" => ExecStatus::Revert,
            _ => ExecStatus::Other(value),
        }
    }
}

impl From<ExecStatus> for String {
    fn from(value: ExecStatus) -> Self {
        match value {
            ExecStatus::None => "None".to_string(),
            ExecStatus::Revert => "Revert".to_string(),
            ExecStatus::Other(other) => other,
        }
    }
}

/// Event emitted during execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub data: Bytes,
}

/// One execution result of a mined transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(rename = "excepted")]
    pub status: ExecStatus,
    #[serde(rename = "exceptedMessage", default)]
    pub status_message: Option<String>,
    #[serde(rename = "log", default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == ExecStatus::None
    }
}

/// Remote node collaborator
pub trait ChainClient: Send + Sync {
    /// Read-only call; returns raw ABI-encoded return data
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<Bytes, ClientError>> + Send;

    /// Submit a transaction; resolves once the node accepted it
    fn send(
        &self,
        request: SendRequest,
    ) -> impl Future<Output = Result<TxId, ClientError>> + Send;

    /// Receipt results of a transaction; empty until it is mined
    fn receipt(
        &self,
        tx_id: &TxId,
    ) -> impl Future<Output = Result<Vec<Receipt>, ClientError>> + Send;

    /// Native balance of an account or contract
    fn balance(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<U256, ClientError>> + Send;
}
