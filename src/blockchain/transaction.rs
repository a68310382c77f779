//! Transaction building, signing and broadcasting.
//!
//! # Responsibilities
//! - Build legacy value transfers from node gas price and nonce
//! - Sign them locally with a short-lived signer
//! - Broadcast the encoded payload, exactly once per call
//!
//! Fee estimation and nonce policy are the node's: the builder takes
//! `eth_gasPrice` and `eth_getTransactionCount` at face value.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::signers::SignerSync;
use async_trait::async_trait;

use crate::blockchain::client::NodeConnection;
use crate::blockchain::keys::PrivateKey;
use crate::blockchain::types::{
    SignedTransaction, TransactionHash, UnsignedTransaction, WalletError, WalletResult,
};
use crate::ports::{Broadcaster, TransactionSigner, TransferBuilder};

/// Gas used by a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Convert a decimal ether amount to wei.
pub fn ether_to_wei(amount_eth: f64) -> WalletResult<U256> {
    if !amount_eth.is_finite() || amount_eth <= 0.0 {
        return Err(WalletError::InvalidAmount(format!(
            "{} is not a positive amount",
            amount_eth
        )));
    }
    let wei = parse_ether(&amount_eth.to_string())
        .map_err(|e| WalletError::InvalidAmount(format!("{}: {}", amount_eth, e)))?;
    if wei.is_zero() {
        return Err(WalletError::InvalidAmount(format!(
            "{} is smaller than one wei",
            amount_eth
        )));
    }
    Ok(wei)
}

/// Builds transfers using the node for gas price, nonce and chain id.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    connection: NodeConnection,
    gas_limit: u64,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(connection: NodeConnection, gas_limit: u64) -> Self {
        Self {
            connection,
            gas_limit,
        }
    }
}

#[async_trait]
impl TransferBuilder for TxBuilder {
    async fn build_transfer(
        &self,
        from: Address,
        to: Address,
        amount_eth: f64,
    ) -> WalletResult<UnsignedTransaction> {
        let value = ether_to_wei(amount_eth)?;

        let gas_price = self.connection.get_gas_price().await?;
        let nonce = self.connection.get_transaction_count(from).await?;
        let chain_id = self.connection.chain_id().await?;

        tracing::debug!(
            from = %from,
            to = %to,
            value = %value,
            nonce = nonce,
            gas_price = gas_price,
            "Built transfer"
        );

        Ok(UnsignedTransaction::new(TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Call(to),
            value,
            input: Bytes::new(),
        }))
    }
}

/// Signs with an in-process secp256k1 key.
///
/// The signer is rebuilt from the key for each call and dropped right after.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTxSigner;

impl LocalTxSigner {
    /// Sign synchronously; shared by the async port.
    pub fn sign(key: &PrivateKey, unsigned: &UnsignedTransaction) -> WalletResult<SignedTransaction> {
        let signer = key.signer()?;
        let tx = unsigned.tx().clone();

        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| WalletError::Signing(format!("Signing failed: {}", e)))?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedTransaction::from_raw(envelope.encoded_2718()))
    }
}

#[async_trait]
impl TransactionSigner for LocalTxSigner {
    async fn sign_transaction(
        &self,
        key: &PrivateKey,
        unsigned: &UnsignedTransaction,
    ) -> WalletResult<SignedTransaction> {
        Self::sign(key, unsigned)
    }
}

/// Submits through the node's `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct NodeBroadcaster {
    connection: NodeConnection,
}

impl NodeBroadcaster {
    pub fn new(connection: NodeConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl Broadcaster for NodeBroadcaster {
    async fn submit_transaction(&self, signed: &SignedTransaction) -> WalletResult<TransactionHash> {
        let hash = self.connection.send_raw_transaction(signed).await?;
        tracing::info!(tx_hash = %hash, "Transaction accepted by node");
        Ok(hash)
    }
}
