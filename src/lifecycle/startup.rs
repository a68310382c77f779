//! Startup orchestration.
//!
//! # Responsibilities
//! - Configure the node endpoint
//! - Resolve and validate the mnemonic phrase
//! - Wire the production capabilities
//! - Open the session (derives sender and receiver)
//!
//! # Design Decisions
//! - Fail fast: a bad endpoint or phrase is fatal
//! - Steps run in order, not concurrently

use std::sync::Arc;

use crate::blockchain::client::NodeConnection;
use crate::blockchain::keys::{Bip44Deriver, MnemonicPhrase};
use crate::blockchain::transaction::{LocalTxSigner, NodeBroadcaster, TxBuilder};
use crate::blockchain::types::{WalletError, WalletResult};
use crate::config::schema::{WalletConfig, MNEMONIC_ENV_VAR};
use crate::ports::ChainCapabilities;
use crate::session::WalletSession;

/// Production capabilities over one node connection.
pub fn build_capabilities(connection: NodeConnection, config: &WalletConfig) -> ChainCapabilities {
    ChainCapabilities {
        deriver: Arc::new(Bip44Deriver::new(config.wallet.passphrase.as_deref())),
        builder: Arc::new(TxBuilder::new(
            connection.clone(),
            config.transfer.gas_limit,
        )),
        signer: Arc::new(LocalTxSigner),
        broadcaster: Arc::new(NodeBroadcaster::new(connection)),
    }
}

/// Bring up a wallet session from validated configuration.
pub async fn start(config: &WalletConfig) -> WalletResult<WalletSession> {
    let connection = NodeConnection::configure(&config.node).await?;

    let phrase = config.wallet.resolve_mnemonic().ok_or_else(|| {
        WalletError::InvalidMnemonic(format!(
            "No mnemonic configured; set {} or wallet.mnemonic",
            MNEMONIC_ENV_VAR
        ))
    })?;
    let mnemonic = MnemonicPhrase::parse(&phrase)?;
    tracing::info!(words = mnemonic.word_count(), "Mnemonic loaded");

    let capabilities = build_capabilities(connection, config);
    let session = WalletSession::open(
        mnemonic,
        &capabilities,
        config.wallet.sender_index,
        config.wallet.receiver_index,
    )
    .await;

    tracing::info!(ready = session.snapshot().is_ready(), "Wallet session started");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(mnemonic: Option<&str>) -> WalletConfig {
        let mut config = WalletConfig::default();
        config.wallet.mnemonic = mnemonic.map(str::to_string);
        config.node.chain_id = Some(31337);
        config
    }

    #[tokio::test]
    async fn test_start_derives_configured_accounts() {
        let config =
            config_with(Some("test test test test test test test test test test test junk"));
        // The environment may carry a phrase of its own.
        if std::env::var(MNEMONIC_ENV_VAR).is_ok() {
            return;
        }

        let session = start(&config).await.unwrap();
        let sender = session.sender().unwrap();
        assert_eq!(
            sender.address().to_checksum(None),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        assert!(session.receiver().is_some());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_phrase() {
        if std::env::var(MNEMONIC_ENV_VAR).is_ok() {
            return;
        }
        let err = start(&config_with(Some("not a phrase"))).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidMnemonic(_)));
    }

    #[tokio::test]
    async fn test_start_rejects_bad_endpoint() {
        let mut config = config_with(None);
        config.node.rpc_url = "::nope::".into();
        let err = start(&config).await.unwrap_err();
        assert!(matches!(err, WalletError::ConnectionConfig(_)));
    }
}
