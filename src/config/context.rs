//! Deployment context
//!
//! Holds the addresses the vault session needs from deployment (proxy
//! factory and singleton) plus the network and default send options.
//! Stored as JSON.

use crate::client::TxOptions;
use crate::config::Network;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Shared configuration for factories and vault sessions
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singleton: Option<Address>,
    #[serde(default)]
    pub tx_options: TxOptions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_proxy_factory(mut self, address: Address) -> Self {
        self.proxy_factory = Some(address);
        self
    }

    pub fn with_singleton(mut self, address: Address) -> Self {
        self.singleton = Some(address);
        self
    }

    pub fn with_tx_options(mut self, options: TxOptions) -> Self {
        self.tx_options = options;
        self
    }

    /// Load a context from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the context as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
