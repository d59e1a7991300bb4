//! Network selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chain the vault lives on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Regtest,
}

impl Network {
    /// Base58 version byte of a pay-to-pubkey-hash address
    pub fn pubkey_hash_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x52,
            Network::Testnet | Network::Regtest => 0x41,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}
