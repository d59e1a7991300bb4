//! On-chain method surface of the vault and proxy-factory contracts
//!
//! Names, argument order and argument types must match the deployed
//! contracts byte for byte; the selectors are derived from these
//! declarations.

use crate::core::CanonicalTransaction;
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::sol;

sol! {
    /// Vault (singleton behind a proxy) interface
    interface ISafe {
        function setup(
            address[] owners,
            uint256 threshold,
            address to,
            bytes data,
            address fallbackHandler,
            address paymentToken,
            uint256 payment,
            address paymentReceiver
        ) external;

        function getOwners() external view returns (address[]);
        function getThreshold() external view returns (uint256);
        function nonce() external view returns (uint256);
        function isOwner(address owner) external view returns (bool);
        function approvedHashes(address owner, bytes32 hash) external view returns (uint256);

        function getTransactionHash(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            uint256 nonce
        ) external view returns (bytes32);

        function approveHash(bytes32 hashToApprove) external;

        function execTransaction(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            bytes signatures
        ) external payable returns (bool success);

        function changeThreshold(uint256 threshold) external;
        function addOwnerWithThreshold(address owner, uint256 threshold) external;
        function removeOwner(address prevOwner, address owner, uint256 threshold) external;
    }

    /// Proxy factory interface
    interface IProxyFactory {
        event ProxyCreation(address proxy, address singleton);

        function createProxyWithNonce(address singleton, bytes initializer, uint256 saltNonce)
            external
            returns (address proxy);
    }
}

/// Byte offset of the proxy address inside `ProxyCreation` log data.
///
/// The event is not indexed, so the data is `proxy ‖ singleton`, each
/// left-padded to 32 bytes.
pub const PROXY_ADDRESS_LOG_OFFSET: usize = 12;

/// Extract the new vault address from a `ProxyCreation` log payload
pub fn proxy_address_from_log(data: &[u8]) -> Option<Address> {
    let end = PROXY_ADDRESS_LOG_OFFSET + 20;
    if data.len() < end {
        return None;
    }
    Some(Address::from_slice(&data[PROXY_ADDRESS_LOG_OFFSET..end]))
}

/// Encode the `ProxyCreation` payload as the factory emits it
pub fn proxy_creation_log_data(proxy: Address, singleton: Address) -> Bytes {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(proxy.into_word().as_slice());
    data.extend_from_slice(singleton.into_word().as_slice());
    data.into()
}

pub(crate) fn transaction_hash_call(tx: &CanonicalTransaction) -> ISafe::getTransactionHashCall {
    ISafe::getTransactionHashCall {
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        operation: tx.operation.as_u8(),
        safeTxGas: tx.safe_tx_gas,
        baseGas: tx.base_gas,
        gasPrice: tx.gas_price,
        gasToken: tx.gas_token,
        refundReceiver: tx.refund_receiver,
        nonce: tx.nonce,
    }
}

pub(crate) fn exec_transaction_call(
    tx: &CanonicalTransaction,
    signatures: Bytes,
) -> ISafe::execTransactionCall {
    ISafe::execTransactionCall {
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        operation: tx.operation.as_u8(),
        safeTxGas: tx.safe_tx_gas,
        baseGas: tx.base_gas,
        gasPrice: tx.gas_price,
        gasToken: tx.gas_token,
        refundReceiver: tx.refund_receiver,
        signatures,
    }
}
