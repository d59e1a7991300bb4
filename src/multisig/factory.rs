//! Singleton and proxy-factory deployment
//!
//! Vaults are proxies pointing at one shared singleton. Both the singleton
//! and the proxy factory are ordinary contract creations whose address is
//! read back from the creation receipt once it is mined.

use crate::client::{ChainClient, Receipt, SendRequest, TxId, TxOptions};
use crate::config::Context;
use crate::multisig::wallet::VaultError;
use alloy_primitives::{Address, Bytes};
use std::sync::Arc;

/// First receipt result of a mined transaction that did not revert
pub(crate) async fn settled_receipt<C: ChainClient>(
    client: &C,
    tx_id: &TxId,
) -> Result<Receipt, VaultError> {
    let receipt = client
        .receipt(tx_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| VaultError::Pending(tx_id.clone()))?;

    if !receipt.succeeded() {
        let reason = receipt
            .status_message
            .clone()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| String::from(receipt.status.clone()));
        return Err(VaultError::Execution(reason));
    }
    Ok(receipt)
}

/// One contract creation tracked from submission to resolved address
#[derive(Clone, Debug, Default)]
struct Deployment {
    tx_id: Option<TxId>,
    address: Option<Address>,
}

impl Deployment {
    fn known(address: Option<Address>) -> Self {
        Self {
            tx_id: None,
            address,
        }
    }
}

/// Deploys the contracts every vault depends on
pub struct Factory<C: ChainClient> {
    client: Arc<C>,
    sender: Address,
    tx_options: TxOptions,
    singleton: Deployment,
    proxy_factory: Deployment,
}

impl<C: ChainClient> Factory<C> {
    pub fn new(client: Arc<C>, sender: Address, tx_options: TxOptions) -> Self {
        Self {
            client,
            sender,
            tx_options,
            singleton: Deployment::default(),
            proxy_factory: Deployment::default(),
        }
    }

    /// Start from the addresses already recorded in a context
    pub fn from_context(client: Arc<C>, sender: Address, context: &Context) -> Self {
        Self {
            client,
            sender,
            tx_options: context.tx_options.clone(),
            singleton: Deployment::known(context.singleton),
            proxy_factory: Deployment::known(context.proxy_factory),
        }
    }

    /// Submit the singleton creation; repeated calls return the first tx id
    pub async fn deploy_singleton(&mut self, bytecode: impl Into<Bytes>) -> Result<TxId, VaultError> {
        let request = SendRequest::deploy(self.sender, bytecode, self.tx_options.clone());
        let tx_id = Self::deploy(&self.client, &mut self.singleton, request).await?;
        log::info!("Singleton deployment submitted: {}", tx_id);
        Ok(tx_id)
    }

    /// Submit the proxy factory creation; repeated calls return the first tx id
    pub async fn deploy_proxy_factory(
        &mut self,
        bytecode: impl Into<Bytes>,
    ) -> Result<TxId, VaultError> {
        let request = SendRequest::deploy(self.sender, bytecode, self.tx_options.clone());
        let tx_id = Self::deploy(&self.client, &mut self.proxy_factory, request).await?;
        log::info!("Proxy factory deployment submitted: {}", tx_id);
        Ok(tx_id)
    }

    pub async fn singleton_address(&mut self) -> Result<Address, VaultError> {
        Self::resolve(&self.client, &mut self.singleton).await
    }

    pub async fn proxy_factory_address(&mut self) -> Result<Address, VaultError> {
        Self::resolve(&self.client, &mut self.proxy_factory).await
    }

    /// Copy resolved addresses into `context`; unresolved ones are left as is
    pub fn apply_to(&self, context: &mut Context) {
        if let Some(singleton) = self.singleton.address {
            context.singleton = Some(singleton);
        }
        if let Some(proxy_factory) = self.proxy_factory.address {
            context.proxy_factory = Some(proxy_factory);
        }
    }

    async fn deploy(
        client: &C,
        deployment: &mut Deployment,
        request: SendRequest,
    ) -> Result<TxId, VaultError> {
        if let Some(tx_id) = &deployment.tx_id {
            return Ok(tx_id.clone());
        }
        let tx_id = client.send(request).await?;
        deployment.tx_id = Some(tx_id.clone());
        Ok(tx_id)
    }

    async fn resolve(client: &C, deployment: &mut Deployment) -> Result<Address, VaultError> {
        if let Some(address) = deployment.address {
            return Ok(address);
        }
        let tx_id = deployment.tx_id.as_ref().ok_or(VaultError::NotDeployed)?;
        let receipt = settled_receipt(client, tx_id).await?;
        let address = receipt.contract_address.ok_or_else(|| {
            VaultError::Execution(format!("receipt of {} has no contract address", tx_id))
        })?;

        log::info!("Contract created at {}", address);
        deployment.address = Some(address);
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ContractKind, InMemoryChain};
    use alloy_primitives::address;

    const DEPLOYER: Address = address!("b118e03f6575aa270673c8d86d6dcb07eb2d9221");

    fn factory(chain: &Arc<InMemoryChain>) -> Factory<InMemoryChain> {
        Factory::new(chain.clone(), DEPLOYER, TxOptions::default())
    }

    #[tokio::test]
    async fn test_address_before_deploy() {
        let chain = Arc::new(InMemoryChain::new());
        let mut factory = factory(&chain);
        assert!(matches!(
            factory.singleton_address().await,
            Err(VaultError::NotDeployed)
        ));
    }

    #[tokio::test]
    async fn test_deploy_is_idempotent() {
        let chain = Arc::new(InMemoryChain::new());
        let mut factory = factory(&chain);

        let first = factory.deploy_singleton(vec![0x01]).await.unwrap();
        let second = factory.deploy_singleton(vec![0x02]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(chain.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_pending_then_resolved() {
        let chain = Arc::new(InMemoryChain::new());
        chain.register_code(vec![0x5a, 0xfe], ContractKind::Singleton).await;
        chain.register_code(vec![0xfa, 0xc7], ContractKind::ProxyFactory).await;
        let mut factory = factory(&chain);

        let tx_id = factory.deploy_singleton(vec![0x5a, 0xfe]).await.unwrap();
        factory.deploy_proxy_factory(vec![0xfa, 0xc7]).await.unwrap();

        match factory.singleton_address().await {
            Err(VaultError::Pending(pending)) => assert_eq!(pending, tx_id),
            other => panic!("expected pending, got {:?}", other),
        }

        chain.mine().await;
        let singleton = factory.singleton_address().await.unwrap();
        let proxy_factory = factory.proxy_factory_address().await.unwrap();
        assert_ne!(singleton, proxy_factory);

        let mut context = Context::default();
        factory.apply_to(&mut context);
        assert_eq!(context.singleton, Some(singleton));
        assert_eq!(context.proxy_factory, Some(proxy_factory));
    }

    #[tokio::test]
    async fn test_known_addresses_skip_lookup() {
        let chain = Arc::new(InMemoryChain::new());
        let singleton = address!("91ead1c01f00bffb97d9e11ddf23468d8f1ce963");
        let context = Context::default().with_singleton(singleton);
        let mut factory = Factory::from_context(chain, DEPLOYER, &context);

        assert_eq!(factory.singleton_address().await.unwrap(), singleton);
        assert!(matches!(
            factory.proxy_factory_address().await,
            Err(VaultError::NotDeployed)
        ));
    }
}
