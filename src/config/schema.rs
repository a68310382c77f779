//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Environment variable that overrides `wallet.mnemonic`.
pub const MNEMONIC_ENV_VAR: &str = "KEYFLOW_MNEMONIC";

/// Root configuration for the wallet session.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Node endpoint settings.
    pub node: NodeConfig,

    /// Mnemonic and derivation indices.
    pub wallet: KeysConfig,

    /// Test transfer parameters.
    pub transfer: TransferConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Node connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Chain ID used for EIP-155 signing. Queried from the node when unset.
    pub chain_id: Option<u64>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Probe the node with `eth_chainId` while configuring.
    pub verify_on_configure: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: None,
            rpc_timeout_secs: 10,
            verify_on_configure: false,
        }
    }
}

/// Key derivation configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeysConfig {
    /// BIP-39 phrase. `KEYFLOW_MNEMONIC` takes precedence.
    pub mnemonic: Option<String>,

    /// Optional BIP-39 passphrase ("" when absent).
    pub passphrase: Option<String>,

    /// Derivation index of the sending account.
    pub sender_index: u32,

    /// Derivation index of the receiving account.
    pub receiver_index: u32,
}

impl KeysConfig {
    /// Resolve the mnemonic, preferring the environment over the file.
    pub fn resolve_mnemonic(&self) -> Option<String> {
        std::env::var(MNEMONIC_ENV_VAR)
            .ok()
            .filter(|phrase| !phrase.trim().is_empty())
            .or_else(|| self.mnemonic.clone())
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            mnemonic: None,
            passphrase: None,
            sender_index: 0,
            receiver_index: 1,
        }
    }
}

// Secrets stay out of debug output.
impl std::fmt::Debug for KeysConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysConfig")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("sender_index", &self.sender_index)
            .field("receiver_index", &self.receiver_index)
            .finish()
    }
}

/// Transfer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Amount to send, in ether.
    pub amount_eth: f64,

    /// Gas limit for a plain value transfer.
    pub gas_limit: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            amount_eth: 0.001,
            gas_limit: 21_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
