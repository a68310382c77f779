//! Node connection with timeout and error handling.
//!
//! # Responsibilities
//! - Hold the single endpoint used for every chain read and write
//! - Query chain state (chain id, gas price, transaction count)
//! - Submit raw transactions
//! - Classify failures into rejection vs. network unavailability
//!
//! No call is retried: a failure is surfaced to the caller as-is.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::{RpcError, TransportError};
use tokio::sync::OnceCell;
use tokio::time::timeout;

use crate::blockchain::types::{
    NodeConfig, SignedTransaction, TransactionHash, WalletError, WalletResult,
};

/// Configured endpoint shared by the builder and the broadcaster.
#[derive(Clone)]
pub struct NodeConnection {
    provider: Arc<dyn Provider + Send + Sync>,
    rpc_url: url::Url,
    timeout_duration: Duration,
    chain_id: Arc<OnceCell<u64>>,
}

impl NodeConnection {
    /// Configure the endpoint.
    ///
    /// Fails with `ConnectionConfig` if the URL is malformed, or if
    /// `verify_on_configure` is set and the node cannot be reached.
    pub async fn configure(config: &NodeConfig) -> WalletResult<Self> {
        let rpc_url: url::Url = config.rpc_url.parse().map_err(|e| {
            WalletError::ConnectionConfig(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        if !matches!(rpc_url.scheme(), "http" | "https") {
            return Err(WalletError::ConnectionConfig(format!(
                "Unsupported RPC URL scheme '{}'",
                rpc_url.scheme()
            )));
        }

        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
        let chain_id = match config.chain_id {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };

        let connection = Self {
            provider: Arc::new(provider),
            rpc_url,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            chain_id: Arc::new(chain_id),
        };

        if config.verify_on_configure {
            let id = connection.fetch_chain_id().await.map_err(|e| {
                WalletError::ConnectionConfig(format!("Node unreachable at configure time: {}", e))
            })?;
            if let Some(expected) = config.chain_id {
                if expected != id {
                    return Err(WalletError::ConnectionConfig(format!(
                        "Chain ID mismatch: expected {}, got {}",
                        expected, id
                    )));
                }
            }
            let _ = connection.chain_id.set(id);
        }

        tracing::info!(
            rpc_url = %connection.rpc_url,
            chain_id = ?config.chain_id,
            timeout_secs = config.rpc_timeout_secs,
            "Node connection configured"
        );

        Ok(connection)
    }

    /// Chain ID, from config or queried once from the node.
    pub async fn chain_id(&self) -> WalletResult<u64> {
        self.chain_id
            .get_or_try_init(|| self.fetch_chain_id())
            .await
            .copied()
    }

    async fn fetch_chain_id(&self) -> WalletResult<u64> {
        match timeout(self.timeout_duration, self.provider.get_chain_id()).await {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(e)) => Err(read_error("eth_chainId", e)),
            Err(_) => Err(self.timed_out("eth_chainId")),
        }
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> WalletResult<u128> {
        match timeout(self.timeout_duration, self.provider.get_gas_price()).await {
            Ok(Ok(price)) => Ok(price),
            Ok(Err(e)) => Err(read_error("eth_gasPrice", e)),
            Err(_) => Err(self.timed_out("eth_gasPrice")),
        }
    }

    /// Transaction count (nonce) for an address.
    pub async fn get_transaction_count(&self, address: Address) -> WalletResult<u64> {
        match timeout(
            self.timeout_duration,
            self.provider.get_transaction_count(address),
        )
        .await
        {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(e)) => Err(read_error("eth_getTransactionCount", e)),
            Err(_) => Err(self.timed_out("eth_getTransactionCount")),
        }
    }

    /// Submit a signed transaction and return the hash the node reports.
    pub async fn send_raw_transaction(
        &self,
        signed: &SignedTransaction,
    ) -> WalletResult<TransactionHash> {
        match timeout(
            self.timeout_duration,
            self.provider.send_raw_transaction(signed.raw()),
        )
        .await
        {
            Ok(Ok(pending)) => Ok(TransactionHash(*pending.tx_hash())),
            Ok(Err(e)) => Err(submit_error(e)),
            Err(_) => Err(self.timed_out("eth_sendRawTransaction")),
        }
    }

    /// The configured endpoint.
    pub fn rpc_url(&self) -> &url::Url {
        &self.rpc_url
    }

    fn timed_out(&self, method: &str) -> WalletError {
        WalletError::NetworkUnavailable(format!(
            "{} timed out after {} seconds",
            method,
            self.timeout_duration.as_secs()
        ))
    }
}

impl std::fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConnection")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("chain_id", &self.chain_id.get())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

/// Reads that fail for any reason leave the node unusable for this attempt.
fn read_error(method: &str, err: TransportError) -> WalletError {
    WalletError::NetworkUnavailable(format!("{} failed: {}", method, err))
}

/// Only an error response means the node saw and refused the payload.
/// A serialization failure never left this process.
fn submit_error(err: TransportError) -> WalletError {
    match err {
        RpcError::ErrorResp(payload) => WalletError::BroadcastRejected(format!(
            "{} (code {})",
            payload.message, payload.code
        )),
        RpcError::SerError(e) => WalletError::Signing(format!("Malformed payload: {}", e)),
        other => WalletError::NetworkUnavailable(other.to_string()),
    }
}
