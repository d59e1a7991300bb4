//! Vault session
//!
//! Drives one vault contract through deployment, setup and the
//! propose → approve → execute cycle. Every write returns as soon as the
//! node accepted it; callers confirm the transaction (see
//! [`VaultSession::confirm`]) before issuing anything that depends on it.
//!
//! Owners and threshold are cached best-effort. Owner management always
//! re-reads the owner list before validating.

use crate::client::{ChainClient, ClientError, Receipt, SendRequest, TxId, TxOptions};
use crate::config::Context;
use crate::core::{CanonicalTransaction, TransactionTemplate};
use crate::multisig::abi::{
    exec_transaction_call, proxy_address_from_log, transaction_hash_call, IProxyFactory, ISafe,
};
use crate::multisig::factory::settled_receipt;
use crate::multisig::owners::previous_owner;
use crate::multisig::signature::{approved_hash_signature, encode_signatures, Signature, SignatureBundle};
use crate::multisig::transaction::{PendingProposal, ProposalError};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use std::sync::Arc;
use thiserror::Error;

/// Errors related to vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Vault not deployed")]
    NotDeployed,
    #[error("Transaction {0} may not have been mined yet")]
    Pending(TxId),
    #[error("Transaction failed: {0}")]
    Execution(String),
    #[error("Invalid configuration: {owners} owner(s) with threshold {threshold}")]
    InvalidConfiguration { owners: usize, threshold: u64 },
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Insufficient approvals: have {have}, need {need}")]
    InsufficientApprovals { have: usize, need: u64 },
    #[error("Owner not found: {0}")]
    OwnerNotFound(Address),
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
    #[error("ABI error: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    #[error("Proposal error: {0}")]
    Proposal(#[from] ProposalError),
}

/// Where a session is in the vault lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No address and no deployment
    Unconfigured,
    /// Deployment sent, address not resolved yet
    PendingDeployment,
    /// Address known, owners and threshold not loaded
    Deployed,
    /// Owners and threshold cached
    Configured,
}

/// A client-side handle on one vault contract
pub struct VaultSession<C: ChainClient> {
    context: Context,
    client: Arc<C>,
    /// Identity used for sends
    sender: Address,
    address: Option<Address>,
    deploy_tx: Option<TxId>,
    owners: Vec<Address>,
    threshold: u64,
}

impl<C: ChainClient> VaultSession<C> {
    /// Session for a vault that still has to be deployed
    pub fn new(context: Context, client: Arc<C>, sender: Address) -> Self {
        Self {
            context,
            client,
            sender,
            address: None,
            deploy_tx: None,
            owners: Vec::new(),
            threshold: 0,
        }
    }

    /// Session for an existing vault
    pub fn at(context: Context, client: Arc<C>, sender: Address, address: Address) -> Self {
        let mut session = Self::new(context, client, sender);
        session.address = Some(address);
        session
    }

    pub fn state(&self) -> SessionState {
        match (self.address, &self.deploy_tx) {
            (Some(_), _) if self.threshold > 0 => SessionState::Configured,
            (Some(_), _) => SessionState::Deployed,
            (None, Some(_)) => SessionState::PendingDeployment,
            (None, None) => SessionState::Unconfigured,
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Resolved vault address, if any
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn deploy_tx(&self) -> Option<&TxId> {
        self.deploy_tx.as_ref()
    }

    /// Owners as last read or set
    pub fn cached_owners(&self) -> &[Address] {
        &self.owners
    }

    /// Threshold as last read or set; zero when unknown
    pub fn cached_threshold(&self) -> u64 {
        self.threshold
    }

    fn vault_address(&self) -> Result<Address, VaultError> {
        self.address.ok_or(VaultError::NotDeployed)
    }

    async fn read<T: SolCall>(&self, call: T) -> Result<T::Return, VaultError> {
        let address = self.vault_address()?;
        let raw = self.client.call(address, call.abi_encode().into()).await?;
        Ok(T::abi_decode_returns(&raw, true)?)
    }

    async fn submit(&self, from: Address, data: Vec<u8>) -> Result<TxId, VaultError> {
        let address = self.vault_address()?;
        let request = SendRequest::call(from, address, data, self.context.tx_options.clone());
        Ok(self.client.send(request).await?)
    }

    // =========================================================================
    // Deployment
    // =========================================================================

    /// Create a proxy for the configured singleton with a random salt
    pub async fn deploy(&mut self) -> Result<TxId, VaultError> {
        let singleton = self
            .context
            .singleton
            .ok_or_else(|| VaultError::Configuration("singleton address not set".into()))?;
        let proxy_factory = self
            .context
            .proxy_factory
            .ok_or_else(|| VaultError::Configuration("proxy factory address not set".into()))?;

        let call = IProxyFactory::createProxyWithNonceCall {
            singleton,
            initializer: Bytes::new(),
            saltNonce: U256::from_be_bytes(rand::random::<[u8; 32]>()),
        };
        let request = SendRequest::call(
            self.sender,
            proxy_factory,
            call.abi_encode(),
            self.context.tx_options.clone(),
        );
        let tx_id = self.client.send(request).await?;

        log::info!("Vault deployment submitted: {}", tx_id);
        self.deploy_tx = Some(tx_id.clone());
        Ok(tx_id)
    }

    /// Vault address, read from the deployment receipt the first time
    pub async fn resolve_address(&mut self) -> Result<Address, VaultError> {
        if let Some(address) = self.address {
            return Ok(address);
        }
        let tx_id = self.deploy_tx.as_ref().ok_or(VaultError::NotDeployed)?;
        let receipt = settled_receipt(self.client.as_ref(), tx_id).await?;

        let address = receipt
            .logs
            .first()
            .and_then(|log| proxy_address_from_log(&log.data))
            .ok_or_else(|| {
                VaultError::Execution(format!("no ProxyCreation log in receipt of {}", tx_id))
            })?;

        log::info!("Vault deployed at {}", address);
        self.address = Some(address);
        Ok(address)
    }

    /// Wait-free check of a previously sent transaction
    pub async fn confirm(&self, tx_id: &TxId) -> Result<Receipt, VaultError> {
        settled_receipt(self.client.as_ref(), tx_id).await
    }

    /// One-time owner and threshold configuration
    pub async fn setup(&mut self, owners: Vec<Address>, threshold: u64) -> Result<TxId, VaultError> {
        if owners.is_empty() || threshold == 0 || (owners.len() as u64) < threshold {
            return Err(VaultError::InvalidConfiguration {
                owners: owners.len(),
                threshold,
            });
        }

        let call = ISafe::setupCall {
            owners: owners.clone(),
            threshold: U256::from(threshold),
            to: Address::ZERO,
            data: Bytes::new(),
            fallbackHandler: Address::ZERO,
            paymentToken: Address::ZERO,
            payment: U256::ZERO,
            paymentReceiver: Address::ZERO,
        };
        let tx_id = self.submit(self.sender, call.abi_encode()).await?;

        log::info!(
            "Vault setup submitted: {} owner(s), threshold {} ({})",
            owners.len(),
            threshold,
            tx_id
        );
        self.owners = owners;
        self.threshold = threshold;
        Ok(tx_id)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Owners in on-chain link order
    pub async fn owners(&self) -> Result<Vec<Address>, VaultError> {
        Ok(self.read(ISafe::getOwnersCall {}).await?._0)
    }

    pub async fn threshold(&self) -> Result<u64, VaultError> {
        let threshold = self.read(ISafe::getThresholdCall {}).await?._0;
        u64::try_from(threshold)
            .map_err(|_| VaultError::InvalidThreshold(format!("on-chain threshold {}", threshold)))
    }

    pub async fn nonce(&self) -> Result<U256, VaultError> {
        Ok(self.read(ISafe::nonceCall {}).await?._0)
    }

    /// Reload the owner and threshold cache
    pub async fn refresh(&mut self) -> Result<(), VaultError> {
        self.owners = self.owners().await?;
        self.threshold = self.threshold().await?;
        log::debug!(
            "Refreshed vault state: {} owner(s), threshold {}",
            self.owners.len(),
            self.threshold
        );
        Ok(())
    }

    pub async fn is_owner(&self, address: Address) -> Result<bool, VaultError> {
        Ok(self.read(ISafe::isOwnerCall { owner: address }).await?._0)
    }

    /// Whether `owner` has a mined `approveHash` for `hash`
    pub async fn is_approved(&self, owner: Address, hash: B256) -> Result<bool, VaultError> {
        let approved = self.read(ISafe::approvedHashesCall { owner, hash }).await?._0;
        Ok(approved != U256::ZERO)
    }

    /// Native balance held by the vault
    pub async fn balance(&self) -> Result<U256, VaultError> {
        let address = self.vault_address()?;
        Ok(self.client.balance(address).await?)
    }

    // =========================================================================
    // Proposals
    // =========================================================================

    /// Build a transaction at the vault's current nonce
    pub async fn propose_transaction(
        &self,
        template: TransactionTemplate,
    ) -> Result<CanonicalTransaction, VaultError> {
        let nonce = self.nonce().await?;
        Ok(CanonicalTransaction::build(template, nonce))
    }

    /// The hash owners sign, as computed by the vault contract
    pub async fn transaction_hash(&self, tx: &CanonicalTransaction) -> Result<B256, VaultError> {
        Ok(self.read(transaction_hash_call(tx)).await?._0)
    }

    /// Start collecting approvals for `tx` against the current threshold
    pub async fn create_proposal(
        &self,
        tx: CanonicalTransaction,
    ) -> Result<PendingProposal, VaultError> {
        let hash = self.transaction_hash(&tx).await?;
        let threshold = self.threshold().await?;
        Ok(PendingProposal::new(tx, hash, threshold as usize))
    }

    /// Send native value to the vault
    pub async fn deposit(&self, amount: U256) -> Result<TxId, VaultError> {
        let address = self.vault_address()?;
        let options = TxOptions {
            value: Some(amount),
            ..Default::default()
        }
        .or(&self.context.tx_options);
        let request = SendRequest::call(self.sender, address, Bytes::new(), options);
        let tx_id = self.client.send(request).await?;
        log::info!("Deposit of {} to {} submitted: {}", amount, address, tx_id);
        Ok(tx_id)
    }

    /// Approve `hash` on-chain as the session sender
    pub async fn approve(&self, hash: B256) -> Result<TxId, VaultError> {
        self.approve_as(self.sender, hash).await
    }

    /// Approve `hash` on-chain from another owner identity
    pub async fn approve_as(&self, owner: Address, hash: B256) -> Result<TxId, VaultError> {
        let call = ISafe::approveHashCall {
            hashToApprove: hash,
        };
        let tx_id = self.submit(owner, call.abi_encode()).await?;
        log::info!("Approval of {} by {} submitted: {}", hash, owner, tx_id);
        Ok(tx_id)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute with the pre-approvals of `approvers`.
    ///
    /// Fails without touching the network when fewer approvers than the
    /// cached threshold are given.
    pub async fn execute(
        &self,
        tx: &CanonicalTransaction,
        approvers: &[Address],
    ) -> Result<TxId, VaultError> {
        if (approvers.len() as u64) < self.threshold {
            return Err(VaultError::InsufficientApprovals {
                have: approvers.len(),
                need: self.threshold,
            });
        }
        let signatures = approvers
            .iter()
            .map(|approver| approved_hash_signature(*approver))
            .collect();
        self.execute_bundle(tx, encode_signatures(signatures)).await
    }

    /// Execute with arbitrary signatures (ECDSA, contract or pre-approval)
    pub async fn execute_with_signatures(
        &self,
        tx: &CanonicalTransaction,
        signatures: Vec<Signature>,
    ) -> Result<TxId, VaultError> {
        self.execute_bundle(tx, encode_signatures(signatures)).await
    }

    /// Execute a proposal whose approvals reached its threshold
    pub async fn execute_proposal(
        &self,
        proposal: &mut PendingProposal,
    ) -> Result<TxId, VaultError> {
        if let Some(tx_id) = &proposal.submitted_tx {
            return Err(ProposalError::AlreadySubmitted(tx_id.clone()).into());
        }
        let bundle = proposal.bundle()?;
        let tx_id = self.execute_bundle(&proposal.transaction, bundle).await?;
        proposal.mark_submitted(tx_id.clone());
        Ok(tx_id)
    }

    async fn execute_bundle(
        &self,
        tx: &CanonicalTransaction,
        bundle: SignatureBundle,
    ) -> Result<TxId, VaultError> {
        let call = exec_transaction_call(tx, bundle.into_bytes());
        let tx_id = self.submit(self.sender, call.abi_encode()).await?;
        log::info!("Execution of nonce {} submitted: {}", tx.nonce, tx_id);
        Ok(tx_id)
    }

    // =========================================================================
    // Owner management (proposals to self)
    // =========================================================================

    async fn propose_self_call(&self, data: Vec<u8>) -> Result<CanonicalTransaction, VaultError> {
        let address = self.vault_address()?;
        self.propose_transaction(TransactionTemplate::new(address).data(data))
            .await
    }

    pub async fn change_threshold(
        &self,
        threshold: u64,
    ) -> Result<CanonicalTransaction, VaultError> {
        check_threshold_positive(threshold)?;
        let owners = self.owners().await?;
        check_threshold(threshold, owners.len() as u64)?;

        let call = ISafe::changeThresholdCall {
            threshold: U256::from(threshold),
        };
        log::info!("Proposing threshold change to {}", threshold);
        self.propose_self_call(call.abi_encode()).await
    }

    pub async fn add_owner(
        &self,
        owner: Address,
        threshold: u64,
    ) -> Result<CanonicalTransaction, VaultError> {
        check_threshold_positive(threshold)?;
        let owners = self.owners().await?;
        check_threshold(threshold, owners.len() as u64 + 1)?;

        let call = ISafe::addOwnerWithThresholdCall {
            owner,
            threshold: U256::from(threshold),
        };
        log::info!("Proposing new owner {} with threshold {}", owner, threshold);
        self.propose_self_call(call.abi_encode()).await
    }

    pub async fn remove_owner(
        &self,
        owner: Address,
        threshold: u64,
    ) -> Result<CanonicalTransaction, VaultError> {
        check_threshold_positive(threshold)?;
        let owners = self.owners().await?;
        check_threshold(threshold, (owners.len() as u64).saturating_sub(1))?;
        let prev_owner = previous_owner(owner, &owners).ok_or(VaultError::OwnerNotFound(owner))?;

        let call = ISafe::removeOwnerCall {
            prevOwner: prev_owner,
            owner,
            threshold: U256::from(threshold),
        };
        log::info!("Proposing removal of owner {} with threshold {}", owner, threshold);
        self.propose_self_call(call.abi_encode()).await
    }
}

/// Checked before any owner lookup
fn check_threshold_positive(threshold: u64) -> Result<(), VaultError> {
    if threshold == 0 {
        return Err(VaultError::InvalidThreshold(
            "threshold must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// `1 <= threshold <= max_owners`
fn check_threshold(threshold: u64, max_owners: u64) -> Result<(), VaultError> {
    check_threshold_positive(threshold)?;
    if threshold > max_owners {
        return Err(VaultError::InvalidThreshold(format!(
            "threshold {} exceeds owner count {}",
            threshold, max_owners
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryChain;
    use crate::crypto::{HashSigner, KeyPair};
    use crate::multisig::SENTINEL_OWNERS;
    use alloy_primitives::address;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const A: Address = address!("1000000000000000000000000000000000000001");
    const B: Address = address!("2000000000000000000000000000000000000002");
    const C: Address = address!("3000000000000000000000000000000000000003");
    const D: Address = address!("dddddddddddddddddddddddddddddddddddddddd");
    const E: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

    /// Forwards to the local chain and counts every request
    struct CountingClient {
        inner: Arc<InMemoryChain>,
        requests: AtomicUsize,
    }

    impl CountingClient {
        fn count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl ChainClient for CountingClient {
        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.call(to, data).await
        }

        async fn send(&self, request: SendRequest) -> Result<TxId, ClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.send(request).await
        }

        async fn receipt(&self, tx_id: &TxId) -> Result<Vec<Receipt>, ClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.receipt(tx_id).await
        }

        async fn balance(&self, address: Address) -> Result<U256, ClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.balance(address).await
        }
    }

    async fn local_context(chain: &InMemoryChain) -> Context {
        Context::default()
            .with_singleton(chain.register_singleton().await)
            .with_proxy_factory(chain.register_proxy_factory().await)
    }

    async fn configured_session<C: ChainClient>(
        chain: &InMemoryChain,
        client: Arc<C>,
        owners: &[Address],
        threshold: u64,
    ) -> VaultSession<C> {
        let context = local_context(chain).await;
        let mut session = VaultSession::new(context, client, owners[0]);

        session.deploy().await.unwrap();
        chain.mine().await;
        session.resolve_address().await.unwrap();

        let tx_id = session.setup(owners.to_vec(), threshold).await.unwrap();
        chain.mine().await;
        session.confirm(&tx_id).await.unwrap();
        session
    }

    async fn approve_all<C: ChainClient>(
        chain: &InMemoryChain,
        session: &VaultSession<C>,
        hash: B256,
        owners: &[Address],
    ) {
        for owner in owners {
            session.approve_as(*owner, hash).await.unwrap();
        }
        chain.mine().await;
    }

    #[tokio::test]
    async fn test_session_lifecycle_states() {
        let chain = Arc::new(InMemoryChain::new());
        let context = local_context(&chain).await;
        let mut session = VaultSession::new(context, chain.clone(), A);
        assert_eq!(session.state(), SessionState::Unconfigured);

        assert!(matches!(
            session.resolve_address().await,
            Err(VaultError::NotDeployed)
        ));

        let tx_id = session.deploy().await.unwrap();
        assert_eq!(session.state(), SessionState::PendingDeployment);
        match session.resolve_address().await {
            Err(VaultError::Pending(pending)) => assert_eq!(pending, tx_id),
            other => panic!("expected pending, got {:?}", other),
        }

        chain.mine().await;
        let address = session.resolve_address().await.unwrap();
        assert_eq!(session.state(), SessionState::Deployed);
        assert_eq!(session.resolve_address().await.unwrap(), address);

        session.setup(vec![A, B, C], 2).await.unwrap();
        assert_eq!(session.state(), SessionState::Configured);
    }

    #[tokio::test]
    async fn test_deploy_requires_addresses() {
        let chain = Arc::new(InMemoryChain::new());
        let mut session = VaultSession::new(Context::default(), chain.clone(), A);
        assert!(matches!(
            session.deploy().await,
            Err(VaultError::Configuration(_))
        ));

        let context = Context::default().with_singleton(chain.register_singleton().await);
        let mut session = VaultSession::new(context, chain, A);
        assert!(matches!(
            session.deploy().await,
            Err(VaultError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_deployment_surfaces_reason() {
        let chain = Arc::new(InMemoryChain::new());
        let context = Context::default()
            .with_singleton(D)
            .with_proxy_factory(chain.register_proxy_factory().await);
        let mut session = VaultSession::new(context, chain.clone(), A);

        session.deploy().await.unwrap();
        chain.mine().await;
        match session.resolve_address().await {
            Err(VaultError::Execution(reason)) => {
                assert_eq!(reason, "Singleton contract not deployed")
            }
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_setup_validation() {
        let chain = Arc::new(InMemoryChain::new());
        let mut session = VaultSession::at(Context::default(), chain, A, D);

        assert!(matches!(
            session.setup(vec![], 1).await,
            Err(VaultError::InvalidConfiguration { owners: 0, .. })
        ));
        assert!(matches!(
            session.setup(vec![A, B], 3).await,
            Err(VaultError::InvalidConfiguration {
                owners: 2,
                threshold: 3
            })
        ));
        assert!(matches!(
            session.setup(vec![A], 0).await,
            Err(VaultError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_after_setup() {
        let chain = Arc::new(InMemoryChain::new());
        let mut session = configured_session(&chain, chain.clone(), &[A, B, C], 2).await;

        assert_eq!(session.owners().await.unwrap(), vec![A, B, C]);
        assert_eq!(session.threshold().await.unwrap(), 2);
        assert_eq!(session.nonce().await.unwrap(), U256::ZERO);
        assert!(session.is_owner(B).await.unwrap());
        assert!(!session.is_owner(D).await.unwrap());
        assert!(!session.is_owner(SENTINEL_OWNERS).await.unwrap());

        session.refresh().await.unwrap();
        assert_eq!(session.cached_owners(), &[A, B, C]);
        assert_eq!(session.cached_threshold(), 2);
    }

    #[tokio::test]
    async fn test_two_of_three_value_transfer() {
        let chain = Arc::new(InMemoryChain::new());
        let session = configured_session(&chain, chain.clone(), &[A, B, C], 2).await;
        let vault = session.address().unwrap();
        chain.fund(vault, U256::from(5000)).await;

        let tx = session
            .propose_transaction(TransactionTemplate::new(D).value(U256::from(1000)))
            .await
            .unwrap();
        let hash = session.transaction_hash(&tx).await.unwrap();

        approve_all(&chain, &session, hash, &[A, B]).await;
        assert!(session.is_approved(A, hash).await.unwrap());
        assert!(session.is_approved(B, hash).await.unwrap());
        assert!(!session.is_approved(C, hash).await.unwrap());

        let bundle = encode_signatures(vec![approved_hash_signature(B), approved_hash_signature(A)]);
        assert_eq!(bundle.len(), 2 * 65);
        assert_eq!(&bundle.as_bytes()[12..32], A.as_slice());

        let tx_id = session.execute(&tx, &[B, A]).await.unwrap();
        chain.mine().await;
        assert!(session.confirm(&tx_id).await.unwrap().succeeded());

        assert_eq!(chain.balance(D).await.unwrap(), U256::from(1000));
        assert_eq!(session.balance().await.unwrap(), U256::from(4000));
        assert_eq!(session.nonce().await.unwrap(), U256::from(1));
    }

    #[tokio::test]
    async fn test_insufficient_approvals_makes_no_request() {
        let chain = Arc::new(InMemoryChain::new());
        let client = Arc::new(CountingClient {
            inner: chain.clone(),
            requests: AtomicUsize::new(0),
        });
        let session = configured_session(&chain, client.clone(), &[A, B, C], 2).await;
        let tx = session
            .propose_transaction(TransactionTemplate::new(D).value(U256::from(1000)))
            .await
            .unwrap();

        let before = client.count();
        let result = session.execute(&tx, &[A]).await;
        assert!(matches!(
            result,
            Err(VaultError::InsufficientApprovals { have: 1, need: 2 })
        ));
        assert_eq!(client.count(), before);
        assert_eq!(chain.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_on_chain_approval_reverts() {
        let chain = Arc::new(InMemoryChain::new());
        let session = configured_session(&chain, chain.clone(), &[A, B, C], 2).await;
        let tx = session
            .propose_transaction(TransactionTemplate::new(D))
            .await
            .unwrap();
        let hash = session.transaction_hash(&tx).await.unwrap();
        approve_all(&chain, &session, hash, &[B]).await;

        // C never approved
        let tx_id = session.execute(&tx, &[B, C]).await.unwrap();
        chain.mine().await;
        match session.confirm(&tx_id).await {
            Err(VaultError::Execution(reason)) => assert_eq!(reason, "GS025"),
            other => panic!("expected revert, got {:?}", other),
        }
        assert_eq!(session.nonce().await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn test_remove_owner_end_to_end() {
        let chain = Arc::new(InMemoryChain::new());
        let session = configured_session(&chain, chain.clone(), &[A, B, C], 2).await;

        let tx = session.remove_owner(C, 2).await.unwrap();
        assert_eq!(tx.to, session.address().unwrap());
        let decoded = ISafe::removeOwnerCall::abi_decode(&tx.data, true).unwrap();
        assert_eq!(decoded.prevOwner, B);
        assert_eq!(decoded.owner, C);

        let hash = session.transaction_hash(&tx).await.unwrap();
        approve_all(&chain, &session, hash, &[A, B]).await;
        let tx_id = session.execute(&tx, &[A, B]).await.unwrap();
        chain.mine().await;
        session.confirm(&tx_id).await.unwrap();

        assert_eq!(session.owners().await.unwrap(), vec![A, B]);
        assert_eq!(session.threshold().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_add_owner_and_change_threshold() {
        let chain = Arc::new(InMemoryChain::new());
        let session = configured_session(&chain, chain.clone(), &[A, B], 1).await;

        let tx = session.add_owner(E, 2).await.unwrap();
        let tx_id = session.execute(&tx, &[A]).await.unwrap();
        chain.mine().await;
        session.confirm(&tx_id).await.unwrap();
        assert_eq!(session.owners().await.unwrap(), vec![E, A, B]);
        assert_eq!(session.threshold().await.unwrap(), 2);

        let mut session = session;
        session.refresh().await.unwrap();
        let tx = session.change_threshold(3).await.unwrap();
        let hash = session.transaction_hash(&tx).await.unwrap();
        approve_all(&chain, &session, hash, &[E]).await;
        let tx_id = session.execute(&tx, &[A, E]).await.unwrap();
        chain.mine().await;
        session.confirm(&tx_id).await.unwrap();
        assert_eq!(session.threshold().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_owner_management_threshold_bounds() {
        let chain = Arc::new(InMemoryChain::new());
        let session = configured_session(&chain, chain.clone(), &[A, B, C], 2).await;

        assert!(session.change_threshold(3).await.is_ok());
        assert!(matches!(
            session.change_threshold(4).await,
            Err(VaultError::InvalidThreshold(_))
        ));
        assert!(matches!(
            session.change_threshold(0).await,
            Err(VaultError::InvalidThreshold(_))
        ));

        assert!(session.add_owner(E, 4).await.is_ok());
        assert!(matches!(
            session.add_owner(E, 5).await,
            Err(VaultError::InvalidThreshold(_))
        ));

        assert!(session.remove_owner(C, 2).await.is_ok());
        assert!(matches!(
            session.remove_owner(C, 3).await,
            Err(VaultError::InvalidThreshold(_))
        ));
        assert!(matches!(
            session.remove_owner(D, 1).await,
            Err(VaultError::OwnerNotFound(owner)) if owner == D
        ));
    }

    #[tokio::test]
    async fn test_zero_threshold_rejected_before_any_request() {
        let chain = Arc::new(InMemoryChain::new());
        let client = Arc::new(CountingClient {
            inner: chain.clone(),
            requests: AtomicUsize::new(0),
        });
        let session = VaultSession::new(Context::default(), client.clone(), A);

        assert!(matches!(
            session.change_threshold(0).await,
            Err(VaultError::InvalidThreshold(_))
        ));
        assert!(matches!(
            session.add_owner(D, 0).await,
            Err(VaultError::InvalidThreshold(_))
        ));
        assert!(matches!(
            session.remove_owner(C, 0).await,
            Err(VaultError::InvalidThreshold(_))
        ));
        assert_eq!(client.count(), 0);
    }

    #[tokio::test]
    async fn test_deposit_credits_vault() {
        let chain = Arc::new(InMemoryChain::new());
        let session = configured_session(&chain, chain.clone(), &[A, B], 1).await;

        let tx_id = session.deposit(U256::from(2500)).await.unwrap();
        assert_eq!(session.balance().await.unwrap(), U256::ZERO);

        chain.mine().await;
        session.confirm(&tx_id).await.unwrap();
        assert_eq!(session.balance().await.unwrap(), U256::from(2500));
    }

    #[tokio::test]
    async fn test_ecdsa_proposal_execution() {
        let chain = Arc::new(InMemoryChain::new());
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let owners: Vec<Address> = keys.iter().map(|k| k.signer_address()).collect();
        let session = configured_session(&chain, chain.clone(), &owners, 2).await;
        chain
            .fund(session.address().unwrap(), U256::from(10))
            .await;

        let tx = session
            .propose_transaction(TransactionTemplate::new(D).value(U256::from(10)))
            .await
            .unwrap();
        let mut proposal = session.create_proposal(tx).await.unwrap();
        assert_eq!(proposal.threshold, 2);

        proposal.sign_with(&keys[2], &owners).unwrap();
        proposal.sign_with(&keys[1], &owners).unwrap();
        let tx_id = session.execute_proposal(&mut proposal).await.unwrap();
        assert_eq!(proposal.submitted_tx.as_ref(), Some(&tx_id));

        chain.mine().await;
        session.confirm(&tx_id).await.unwrap();
        assert_eq!(chain.balance(D).await.unwrap(), U256::from(10));

        assert!(matches!(
            session.execute_proposal(&mut proposal).await,
            Err(VaultError::Proposal(ProposalError::AlreadySubmitted(_)))
        ));
    }

    #[tokio::test]
    async fn test_dynamic_signature_accepted() {
        let chain = Arc::new(InMemoryChain::new());
        let session = configured_session(&chain, chain.clone(), &[A, B], 2).await;
        let tx = session
            .propose_transaction(TransactionTemplate::new(D))
            .await
            .unwrap();
        let hash = session.transaction_hash(&tx).await.unwrap();
        approve_all(&chain, &session, hash, &[A]).await;

        let signatures = vec![
            Signature::dynamic(B, vec![0xab; 40]),
            approved_hash_signature(A),
        ];
        let tx_id = session.execute_with_signatures(&tx, signatures).await.unwrap();
        chain.mine().await;
        session.confirm(&tx_id).await.unwrap();
        assert_eq!(session.nonce().await.unwrap(), U256::from(1));
    }
}
