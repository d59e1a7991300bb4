//! CLI commands for the vault tool
//!
//! Implements all command handlers for the CLI interface. Everything here
//! is offline except `simulate`, which runs against a local chain.

use crate::client::{ChainClient, InMemoryChain};
use crate::config::{Context, Network};
use crate::core::TransactionTemplate;
use crate::crypto::{from_base58, to_base58, HashSigner, KeyPair};
use crate::multisig::{
    approved_hash_signature, encode_signatures, previous_owner, Signature, VaultError,
    VaultSession, SENTINEL_OWNERS,
};
use alloy_primitives::{Address, B256, U256};
use std::path::Path;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load the context at `path`, or the default one when the file is missing
pub fn load_context(path: &Path) -> CliResult<Context> {
    if path.exists() {
        Ok(Context::load(path)?)
    } else {
        log::debug!("No config at {:?}, using defaults", path);
        Ok(Context::default())
    }
}

fn parse_address(value: &str) -> CliResult<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| format!("invalid address: {}", value).into())
}

/// Parse `signer:hexdata`
fn parse_signature(value: &str, dynamic: bool) -> CliResult<Signature> {
    let (signer, data) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <signer>:<hex>, got {}", value))?;
    Ok(Signature::from_hex(signer, data, dynamic)?)
}

/// Encode a signature bundle
pub fn cmd_bundle(approvers: &[String], ecdsa: &[String], dynamic: &[String]) -> CliResult<()> {
    let mut signatures = Vec::new();
    for approver in approvers {
        signatures.push(approved_hash_signature(parse_address(approver)?));
    }
    for value in ecdsa {
        signatures.push(parse_signature(value, false)?);
    }
    for value in dynamic {
        signatures.push(parse_signature(value, true)?);
    }

    let count = signatures.len();
    let bundle = encode_signatures(signatures);
    println!("📦 Signature bundle ({} signature(s), {} bytes):", count, bundle.len());
    println!("{}", bundle);
    Ok(())
}

/// Print the pre-approval signature of an owner
pub fn cmd_approval(signer: &str) -> CliResult<()> {
    let signature = approved_hash_signature(parse_address(signer)?);
    println!("0x{}", hex::encode(&signature.data));
    Ok(())
}

/// Print the list entry pointing at `owner`
pub fn cmd_prev_owner(owner: &str, owners: &[String]) -> CliResult<()> {
    let owner = parse_address(owner)?;
    let owners = owners
        .iter()
        .map(|o| parse_address(o))
        .collect::<CliResult<Vec<_>>>()?;

    match previous_owner(owner, &owners) {
        Some(prev) if prev == SENTINEL_OWNERS => println!("{} (sentinel, list head)", prev),
        Some(prev) => println!("{}", prev),
        None => return Err(VaultError::OwnerNotFound(owner).into()),
    }
    Ok(())
}

/// Sign a vault transaction hash with a private key
pub fn cmd_sign(private_key: &str, hash: &str) -> CliResult<()> {
    let key = KeyPair::from_private_key_hex(private_key)?;
    let hash = hash
        .trim()
        .parse::<B256>()
        .map_err(|_| format!("invalid hash: {}", hash))?;
    let signature = key.sign_hash(&hash)?;

    println!("✍️  Signed {}", hash);
    println!("   Signer:    {}", key.signer_address());
    println!("   Signature: 0x{}", hex::encode(&signature.data));
    println!("   Use with:  --ecdsa {}:0x{}", signature.signer, hex::encode(&signature.data));
    Ok(())
}

/// Convert between hex and base58 address forms
pub fn cmd_address(value: &str, network: Network) -> CliResult<()> {
    let value = value.trim();
    if value.starts_with("0x") {
        let address = parse_address(value)?;
        println!("{}", to_base58(address, network));
    } else {
        let (address, network) = from_base58(value)?;
        println!("{} ({})", address, network);
    }
    Ok(())
}

/// Write a config file
pub fn cmd_config_init(
    path: &Path,
    network: Network,
    singleton: Option<&str>,
    proxy_factory: Option<&str>,
    force: bool,
) -> CliResult<()> {
    if path.exists() && !force {
        println!("⚠️  Config already exists at {:?}", path);
        println!("   Use --force to overwrite it");
        return Ok(());
    }

    let mut context = Context::new().with_network(network);
    if let Some(singleton) = singleton {
        context = context.with_singleton(parse_address(singleton)?);
    }
    if let Some(proxy_factory) = proxy_factory {
        context = context.with_proxy_factory(parse_address(proxy_factory)?);
    }
    context.save(path)?;

    println!("✅ Config written to {:?}", path);
    println!("   🌐 Network: {}", context.network);
    Ok(())
}

/// Run the vault lifecycle against a local chain
pub async fn cmd_simulate(context: &Context) -> CliResult<()> {
    let chain = Arc::new(InMemoryChain::new());
    let context = context
        .clone()
        .with_singleton(chain.register_singleton().await)
        .with_proxy_factory(chain.register_proxy_factory().await);

    let mut owners: Vec<Address> = (0..3)
        .map(|_| KeyPair::generate().signer_address())
        .collect();
    owners.sort();
    let recipient = KeyPair::generate().signer_address();

    println!("🧪 Simulating a 2-of-3 vault on a local chain");
    let mut session = VaultSession::new(context.clone(), chain.clone(), owners[0]);
    session.deploy().await?;
    chain.mine().await;
    let vault = session.resolve_address().await?;
    println!("   📍 Vault: {} ({})", vault, to_base58(vault, context.network));

    let tx_id = session.setup(owners.clone(), 2).await?;
    chain.mine().await;
    session.confirm(&tx_id).await?;
    for owner in &owners {
        println!("   👤 Owner: {}", owner);
    }

    let tx_id = session.deposit(U256::from(5000)).await?;
    chain.mine().await;
    session.confirm(&tx_id).await?;
    println!("   💰 Deposited {}", session.balance().await?);
    println!("\n1️⃣  Transfer 1000 with two approvals");
    let tx = session
        .propose_transaction(TransactionTemplate::new(recipient).value(U256::from(1000)))
        .await?;
    let hash = session.transaction_hash(&tx).await?;
    println!("   Hash: {}", hash);
    for owner in &owners[..2] {
        session.approve_as(*owner, hash).await?;
    }
    chain.mine().await;
    let tx_id = session.execute(&tx, &owners[..2]).await?;
    chain.mine().await;
    session.confirm(&tx_id).await?;
    println!(
        "   ✅ Executed; recipient balance {}",
        chain.balance(recipient).await?
    );

    println!("\n2️⃣  Execute with a single approval");
    let tx = session
        .propose_transaction(TransactionTemplate::new(recipient).value(U256::from(1000)))
        .await?;
    match session.execute(&tx, &owners[..1]).await {
        Err(e) => println!("   ✅ Rejected before sending: {}", e),
        Ok(tx_id) => return Err(format!("unexpected submission {}", tx_id).into()),
    }

    println!("\n3️⃣  Remove the last owner, keep threshold 2");
    let tx = session.remove_owner(owners[2], 2).await?;
    let hash = session.transaction_hash(&tx).await?;
    for owner in &owners[..2] {
        session.approve_as(*owner, hash).await?;
    }
    chain.mine().await;
    let tx_id = session.execute(&tx, &owners[..2]).await?;
    chain.mine().await;
    session.confirm(&tx_id).await?;
    session.refresh().await?;
    println!(
        "   ✅ Owners now {:?}, threshold {}",
        session.cached_owners(),
        session.cached_threshold()
    );

    println!("\n📊 Vault balance {}, nonce {}", session.balance().await?, session.nonce().await?);
    Ok(())
}
