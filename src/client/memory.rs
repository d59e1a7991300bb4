//! In-memory chain
//!
//! A deterministic local chain that speaks the vault and proxy-factory
//! ABIs. It keeps the two-phase shape of a real node: `send` only queues a
//! transaction, and nothing executes or produces a receipt until `mine`.
//! Reverts carry the vault's `GSxxx` reason codes.
//!
//! Contract code is not interpreted. Bytecode registered with
//! [`InMemoryChain::register_code`] deploys as the matching contract kind;
//! anything else deploys as an inert contract.

use crate::client::{ChainClient, ClientError, ExecStatus, Log, Receipt, SendRequest, TxId};
use crate::crypto::recover_signer;
use crate::multisig::abi::{proxy_creation_log_data, IProxyFactory, ISafe};
use crate::multisig::SENTINEL_OWNERS;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolInterface, SolValue};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Chain id mixed into simulated transaction hashes
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Kind of contract a registered bytecode deploys as
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractKind {
    Singleton,
    ProxyFactory,
}

#[derive(Clone, Debug)]
struct VaultState {
    singleton: Address,
    /// Link order, head first
    owners: Vec<Address>,
    threshold: usize,
    nonce: U256,
    approved: HashSet<(Address, B256)>,
}

impl VaultState {
    fn new(singleton: Address) -> Self {
        Self {
            singleton,
            owners: Vec::new(),
            threshold: 0,
            nonce: U256::ZERO,
            approved: HashSet::new(),
        }
    }

    fn is_owner(&self, address: &Address) -> bool {
        *address != SENTINEL_OWNERS && self.owners.contains(address)
    }
}

#[derive(Clone, Debug)]
enum Contract {
    Singleton,
    ProxyFactory,
    Vault(Box<VaultState>),
    Inert,
}

/// Effects of a successful execution
#[derive(Default)]
struct Outcome {
    contract_address: Option<Address>,
    logs: Vec<Log>,
}

type Revert = String;

#[derive(Default)]
struct ChainState {
    height: u64,
    tx_counter: u64,
    contracts: HashMap<Address, Contract>,
    balances: HashMap<Address, U256>,
    code_kinds: HashMap<Bytes, ContractKind>,
    mempool: Vec<(TxId, SendRequest)>,
    receipts: HashMap<TxId, Vec<Receipt>>,
}

/// Local chain simulating vault contracts
pub struct InMemoryChain {
    chain_id: u64,
    state: RwLock<ChainState>,
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::with_chain_id(DEFAULT_CHAIN_ID)
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: RwLock::new(ChainState::default()),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Make `bytecode` deploy as the given contract kind
    pub async fn register_code(&self, bytecode: impl Into<Bytes>, kind: ContractKind) {
        self.state.write().await.code_kinds.insert(bytecode.into(), kind);
    }

    /// Install a vault singleton without a deployment transaction
    pub async fn register_singleton(&self) -> Address {
        self.install(b"singleton", Contract::Singleton).await
    }

    /// Install a proxy factory without a deployment transaction
    pub async fn register_proxy_factory(&self) -> Address {
        self.install(b"proxy-factory", Contract::ProxyFactory).await
    }

    async fn install(&self, label: &[u8], contract: Contract) -> Address {
        let mut state = self.state.write().await;
        state.tx_counter += 1;
        let mut seed = label.to_vec();
        seed.extend_from_slice(&state.tx_counter.to_be_bytes());
        let address = Address::from_word(keccak256(seed));
        state.contracts.insert(address, contract);
        address
    }

    /// Credit native balance to an address
    pub async fn fund(&self, address: Address, amount: U256) {
        let mut state = self.state.write().await;
        let balance = state.balances.entry(address).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Number of queued, unmined transactions
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.mempool.len()
    }

    pub async fn height(&self) -> u64 {
        self.state.read().await.height
    }

    /// Execute every queued transaction in submission order as one block.
    ///
    /// Returns the number of transactions included.
    pub async fn mine(&self) -> usize {
        let mut state = self.state.write().await;
        let queued = std::mem::take(&mut state.mempool);
        state.height += 1;
        let height = state.height;

        for (tx_id, request) in &queued {
            let receipt = match state.apply(self.chain_id, tx_id, request) {
                Ok(outcome) => Receipt {
                    contract_address: outcome.contract_address,
                    status: ExecStatus::None,
                    status_message: None,
                    logs: outcome.logs,
                },
                Err(reason) => {
                    log::debug!("Transaction {} reverted: {}", tx_id, reason);
                    Receipt {
                        contract_address: None,
                        status: ExecStatus::Revert,
                        status_message: Some(reason),
                        logs: Vec::new(),
                    }
                }
            };
            state.receipts.insert(tx_id.clone(), vec![receipt]);
        }

        log::debug!("Mined block {} with {} transaction(s)", height, queued.len());
        queued.len()
    }
}

impl ChainState {
    fn next_tx_id(&mut self, request: &SendRequest) -> TxId {
        self.tx_counter += 1;
        let mut seed = self.tx_counter.to_be_bytes().to_vec();
        seed.extend_from_slice(request.from.as_slice());
        seed.extend_from_slice(&request.data);
        TxId(hex::encode(keccak256(seed)))
    }

    fn credit(&mut self, address: Address, amount: U256) {
        let balance = self.balances.entry(address).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn apply(&mut self, chain_id: u64, tx_id: &TxId, request: &SendRequest) -> Result<Outcome, Revert> {
        let value = request.options.value.unwrap_or(U256::ZERO);

        let Some(to) = request.to else {
            let address = Address::from_word(keccak256(tx_id.as_str().as_bytes()));
            let contract = match self.code_kinds.get(&request.data) {
                Some(ContractKind::Singleton) => Contract::Singleton,
                Some(ContractKind::ProxyFactory) => Contract::ProxyFactory,
                None => Contract::Inert,
            };
            self.contracts.insert(address, contract);
            self.credit(address, value);
            return Ok(Outcome {
                contract_address: Some(address),
                logs: Vec::new(),
            });
        };

        let outcome = match self.contracts.get(&to).cloned() {
            None => Outcome::default(),
            Some(Contract::Inert) => Outcome::default(),
            Some(Contract::Singleton) => return Err("singleton cannot be called directly".into()),
            Some(Contract::ProxyFactory) => self.apply_factory(chain_id, to, request)?,
            // Plain deposit
            Some(Contract::Vault(_)) if request.data.is_empty() => Outcome::default(),
            Some(Contract::Vault(vault)) => {
                self.apply_vault(chain_id, to, *vault, request.from, &request.data)?
            }
        };
        self.credit(to, value);
        Ok(outcome)
    }

    fn apply_factory(
        &mut self,
        chain_id: u64,
        factory: Address,
        request: &SendRequest,
    ) -> Result<Outcome, Revert> {
        let call = IProxyFactory::createProxyWithNonceCall::abi_decode(&request.data, true)
            .map_err(|e| format!("invalid factory call: {}", e))?;

        if !matches!(self.contracts.get(&call.singleton), Some(Contract::Singleton)) {
            return Err("Singleton contract not deployed".into());
        }

        let mut seed = factory.to_vec();
        seed.extend_from_slice(call.singleton.as_slice());
        seed.extend_from_slice(&call.saltNonce.to_be_bytes::<32>());
        seed.extend_from_slice(keccak256(&call.initializer).as_slice());
        let proxy = Address::from_word(keccak256(seed));
        if self.contracts.contains_key(&proxy) {
            return Err("Create2 call failed".into());
        }

        self.contracts
            .insert(proxy, Contract::Vault(Box::new(VaultState::new(call.singleton))));
        if !call.initializer.is_empty() {
            let vault = VaultState::new(call.singleton);
            if let Err(reason) = self.apply_vault(chain_id, proxy, vault, factory, &call.initializer) {
                self.contracts.remove(&proxy);
                return Err(reason);
            }
        }

        Ok(Outcome {
            contract_address: None,
            logs: vec![Log {
                address: factory,
                data: proxy_creation_log_data(proxy, call.singleton),
            }],
        })
    }

    /// Run a state-changing vault call against a copy and commit on success
    fn apply_vault(
        &mut self,
        chain_id: u64,
        vault_address: Address,
        mut vault: VaultState,
        sender: Address,
        data: &[u8],
    ) -> Result<Outcome, Revert> {
        let call = ISafe::ISafeCalls::abi_decode(data, true)
            .map_err(|e| format!("invalid vault call: {}", e))?;

        match call {
            ISafe::ISafeCalls::setup(setup) => {
                if vault.threshold > 0 {
                    return Err("GS200".into());
                }
                let threshold = threshold_value(setup.threshold)?;
                vault.owners.clear();
                for owner in setup.owners {
                    add_owner(&mut vault, vault_address, owner, false)?;
                }
                set_threshold(&mut vault, threshold)?;
            }
            ISafe::ISafeCalls::approveHash(approve) => {
                if !vault.is_owner(&sender) {
                    return Err("GS030".into());
                }
                vault.approved.insert((sender, approve.hashToApprove));
            }
            ISafe::ISafeCalls::execTransaction(exec) => {
                return self.exec_transaction(chain_id, vault_address, vault, sender, exec);
            }
            ISafe::ISafeCalls::changeThreshold(_)
            | ISafe::ISafeCalls::addOwnerWithThreshold(_)
            | ISafe::ISafeCalls::removeOwner(_) => {
                if sender != vault_address {
                    return Err("GS031".into());
                }
                apply_self_call(&mut vault, vault_address, call)?;
            }
            _ => return Err("read-only method sent as transaction".into()),
        }

        self.contracts
            .insert(vault_address, Contract::Vault(Box::new(vault)));
        Ok(Outcome::default())
    }

    fn exec_transaction(
        &mut self,
        chain_id: u64,
        vault_address: Address,
        mut vault: VaultState,
        sender: Address,
        exec: ISafe::execTransactionCall,
    ) -> Result<Outcome, Revert> {
        let hash_call = ISafe::getTransactionHashCall {
            to: exec.to,
            value: exec.value,
            data: exec.data.clone(),
            operation: exec.operation,
            safeTxGas: exec.safeTxGas,
            baseGas: exec.baseGas,
            gasPrice: exec.gasPrice,
            gasToken: exec.gasToken,
            refundReceiver: exec.refundReceiver,
            nonce: vault.nonce,
        };
        let hash = transaction_hash(chain_id, vault_address, &hash_call);
        vault.nonce += U256::from(1);

        check_signatures(&vault, hash, &exec.signatures, sender)?;

        if exec.operation != 0 {
            return Err("GS013".into());
        }

        if exec.to == vault_address {
            let inner = ISafe::ISafeCalls::abi_decode(&exec.data, true)
                .map_err(|_| "GS013".to_string())?;
            apply_self_call(&mut vault, vault_address, inner)?;
        } else if exec.value > U256::ZERO {
            let available = self.balances.get(&vault_address).copied().unwrap_or_default();
            if available < exec.value {
                return Err("GS013".into());
            }
            self.balances.insert(vault_address, available - exec.value);
            self.credit(exec.to, exec.value);
        }

        log::debug!(
            "Vault {} (singleton {}) executed nonce {} ({} owners, threshold {})",
            vault_address,
            vault.singleton,
            vault.nonce - U256::from(1),
            vault.owners.len(),
            vault.threshold
        );
        self.contracts
            .insert(vault_address, Contract::Vault(Box::new(vault)));
        Ok(Outcome::default())
    }

    fn read_vault(
        &self,
        chain_id: u64,
        vault_address: Address,
        vault: &VaultState,
        data: &[u8],
    ) -> Result<Bytes, ClientError> {
        let call = ISafe::ISafeCalls::abi_decode(data, true)
            .map_err(|e| ClientError::CallReverted(e.to_string()))?;

        let encoded = match call {
            ISafe::ISafeCalls::getOwners(_) => (vault.owners.clone(),).abi_encode_params(),
            ISafe::ISafeCalls::getThreshold(_) => {
                U256::from(vault.threshold).to_be_bytes::<32>().to_vec()
            }
            ISafe::ISafeCalls::nonce(_) => vault.nonce.to_be_bytes::<32>().to_vec(),
            ISafe::ISafeCalls::isOwner(query) => {
                U256::from(u8::from(vault.is_owner(&query.owner)))
                    .to_be_bytes::<32>()
                    .to_vec()
            }
            ISafe::ISafeCalls::approvedHashes(query) => {
                let approved = vault.approved.contains(&(query.owner, query.hash));
                U256::from(u8::from(approved)).to_be_bytes::<32>().to_vec()
            }
            ISafe::ISafeCalls::getTransactionHash(query) => {
                transaction_hash(chain_id, vault_address, &query).to_vec()
            }
            _ => {
                return Err(ClientError::CallReverted(
                    "state-changing method called read-only".into(),
                ))
            }
        };
        Ok(encoded.into())
    }
}

/// Hash owners approve: binds chain id, vault address and every tx field
fn transaction_hash(
    chain_id: u64,
    vault_address: Address,
    call: &ISafe::getTransactionHashCall,
) -> B256 {
    let mut buf = U256::from(chain_id).to_be_bytes::<32>().to_vec();
    buf.extend_from_slice(vault_address.into_word().as_slice());
    buf.extend_from_slice(&call.abi_encode());
    keccak256(buf)
}

fn threshold_value(threshold: U256) -> Result<usize, Revert> {
    usize::try_from(threshold).map_err(|_| "GS201".to_string())
}

fn set_threshold(vault: &mut VaultState, threshold: usize) -> Result<(), Revert> {
    if threshold > vault.owners.len() {
        return Err("GS201".into());
    }
    if threshold == 0 {
        return Err("GS202".into());
    }
    vault.threshold = threshold;
    Ok(())
}

/// Append during setup, insert at the head afterwards
fn add_owner(
    vault: &mut VaultState,
    vault_address: Address,
    owner: Address,
    at_head: bool,
) -> Result<(), Revert> {
    if owner == Address::ZERO || owner == SENTINEL_OWNERS || owner == vault_address {
        return Err("GS203".into());
    }
    if vault.owners.contains(&owner) {
        return Err("GS204".into());
    }
    if at_head {
        vault.owners.insert(0, owner);
    } else {
        vault.owners.push(owner);
    }
    Ok(())
}

fn apply_self_call(
    vault: &mut VaultState,
    vault_address: Address,
    call: ISafe::ISafeCalls,
) -> Result<(), Revert> {
    match call {
        ISafe::ISafeCalls::changeThreshold(change) => {
            set_threshold(vault, threshold_value(change.threshold)?)
        }
        ISafe::ISafeCalls::addOwnerWithThreshold(add) => {
            add_owner(vault, vault_address, add.owner, true)?;
            set_threshold(vault, threshold_value(add.threshold)?)
        }
        ISafe::ISafeCalls::removeOwner(remove) => {
            let threshold = threshold_value(remove.threshold)?;
            if vault.owners.len().saturating_sub(1) < threshold {
                return Err("GS201".into());
            }
            if remove.owner == Address::ZERO || remove.owner == SENTINEL_OWNERS {
                return Err("GS203".into());
            }
            let index = vault
                .owners
                .iter()
                .position(|owner| *owner == remove.owner)
                .ok_or_else(|| "GS205".to_string())?;
            let expected_prev = if index == 0 {
                SENTINEL_OWNERS
            } else {
                vault.owners[index - 1]
            };
            if expected_prev != remove.prevOwner {
                return Err("GS205".into());
            }
            vault.owners.remove(index);
            set_threshold(vault, threshold)
        }
        _ => Err("GS013".into()),
    }
}

fn eth_signed_message_hash(hash: B256) -> B256 {
    let mut buf = b"\x19Ethereum Signed Message:\n32".to_vec();
    buf.extend_from_slice(hash.as_slice());
    keccak256(buf)
}

/// Verify `threshold` signatures in ascending owner order
fn check_signatures(
    vault: &VaultState,
    hash: B256,
    signatures: &[u8],
    sender: Address,
) -> Result<(), Revert> {
    let required = vault.threshold;
    if required == 0 {
        return Err("GS001".into());
    }
    if signatures.len() < required * 65 {
        return Err("GS020".into());
    }

    let mut last_owner = Address::ZERO;
    for i in 0..required {
        let entry = &signatures[i * 65..(i + 1) * 65];
        let r = B256::from_slice(&entry[..32]);
        let v = entry[64];

        let owner = match v {
            0 => {
                let owner = Address::from_word(r);
                let offset = U256::from_be_slice(&entry[32..64]);
                let offset = usize::try_from(offset).map_err(|_| "GS021".to_string())?;
                if offset < required * 65 {
                    return Err("GS021".into());
                }
                let length_end = offset
                    .checked_add(32)
                    .filter(|end| *end <= signatures.len())
                    .ok_or_else(|| "GS022".to_string())?;
                let length = U256::from_be_slice(&signatures[offset..length_end]);
                let length = usize::try_from(length).map_err(|_| "GS023".to_string())?;
                length_end
                    .checked_add(length)
                    .filter(|end| *end <= signatures.len())
                    .ok_or_else(|| "GS023".to_string())?;
                // Contract verification is not simulated; a well-formed
                // payload from an owner counts as valid.
                if length == 0 {
                    return Err("GS024".into());
                }
                owner
            }
            1 => {
                let owner = Address::from_word(r);
                if sender != owner && !vault.approved.contains(&(owner, hash)) {
                    return Err("GS025".into());
                }
                owner
            }
            v if v > 30 => {
                let mut adjusted = entry.to_vec();
                adjusted[64] = v - 4;
                recover_signer(&eth_signed_message_hash(hash), &adjusted)
                    .map_err(|_| "GS026".to_string())?
            }
            _ => recover_signer(&hash, entry).map_err(|_| "GS026".to_string())?,
        };

        if owner <= last_owner || !vault.is_owner(&owner) {
            return Err("GS026".into());
        }
        last_owner = owner;
    }
    Ok(())
}

impl ChainClient for InMemoryChain {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError> {
        let state = self.state.read().await;
        match state.contracts.get(&to) {
            Some(Contract::Vault(vault)) => state.read_vault(self.chain_id, to, vault, &data),
            Some(_) => Err(ClientError::CallReverted("unsupported read".into())),
            None => Err(ClientError::UnknownContract(to)),
        }
    }

    async fn send(&self, request: SendRequest) -> Result<TxId, ClientError> {
        let mut state = self.state.write().await;
        let tx_id = state.next_tx_id(&request);
        state.mempool.push((tx_id.clone(), request));
        Ok(tx_id)
    }

    async fn receipt(&self, tx_id: &TxId) -> Result<Vec<Receipt>, ClientError> {
        let state = self.state.read().await;
        if let Some(receipts) = state.receipts.get(tx_id) {
            return Ok(receipts.clone());
        }
        if state.mempool.iter().any(|(queued, _)| queued == tx_id) {
            return Ok(Vec::new());
        }
        Err(ClientError::UnknownTransaction(tx_id.clone()))
    }

    async fn balance(&self, address: Address) -> Result<U256, ClientError> {
        let state = self.state.read().await;
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }
}
