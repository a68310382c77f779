//! Wallet session.
//!
//! Owns the phrase, the two derived accounts and the transfer orchestrator
//! for as long as the session lives. Presentation code reads
//! [`SessionSnapshot`]s and issues [`WalletSession::request_send`]; it never
//! touches global state.
//!
//! # Design Decisions
//! - A failed startup derivation leaves that account unset ("not ready");
//!   nothing is retried
//! - Accounts are shared by `Arc`, so snapshots and in-flight sends never
//!   copy key material

use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::blockchain::keys::{Account, DerivationIndex, MnemonicPhrase};
use crate::blockchain::types::{TransactionHash, WalletError, WalletResult};
use crate::ports::ChainCapabilities;
use crate::transfer::{TransactionOrchestrator, TransferEvent, TransferState};

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub sender: Option<Arc<Account>>,
    pub receiver: Option<Arc<Account>>,
    pub transfer_state: TransferState,
}

impl SessionSnapshot {
    /// Both accounts derived; a send can be requested.
    pub fn is_ready(&self) -> bool {
        self.sender.is_some() && self.receiver.is_some()
    }
}

/// Serializable rendering of an account for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub index: u32,
    /// EIP-55 checksummed.
    pub address: String,
    pub public_key: String,
    pub private_key: String,
    pub password: String,
}

impl AccountView {
    /// Render an account, hiding secrets unless `reveal` is set.
    pub fn new(account: &Account, reveal: bool) -> Self {
        let (private_key, password) = if reveal {
            (
                account.private_key().to_hex().to_string(),
                account.password().to_string(),
            )
        } else {
            ("<hidden>".to_string(), "<hidden>".to_string())
        };
        Self {
            index: account.index().value(),
            address: account.address().to_checksum(None),
            public_key: account.public_key().to_string(),
            private_key,
            password,
        }
    }
}

/// One user's wallet session.
pub struct WalletSession {
    mnemonic: MnemonicPhrase,
    sender: Option<Arc<Account>>,
    receiver: Option<Arc<Account>>,
    orchestrator: TransactionOrchestrator,
}

impl WalletSession {
    /// Derive the sender and receiver accounts and open the session.
    ///
    /// Derivation errors are logged and leave the account unset.
    pub async fn open(
        mnemonic: MnemonicPhrase,
        capabilities: &ChainCapabilities,
        sender_index: u32,
        receiver_index: u32,
    ) -> Self {
        let sender = Self::derive_slot(&mnemonic, capabilities, "sender", sender_index).await;
        let receiver =
            Self::derive_slot(&mnemonic, capabilities, "receiver", receiver_index).await;

        Self {
            mnemonic,
            sender,
            receiver,
            orchestrator: TransactionOrchestrator::from_capabilities(capabilities),
        }
    }

    async fn derive_slot(
        mnemonic: &MnemonicPhrase,
        capabilities: &ChainCapabilities,
        role: &'static str,
        index: u32,
    ) -> Option<Arc<Account>> {
        let derived = match DerivationIndex::new(index) {
            Ok(index) => capabilities.deriver.derive(mnemonic, index).await,
            Err(e) => Err(e),
        };
        match derived {
            Ok(account) => {
                tracing::info!(role, index, address = %account.address(), "Account ready");
                Some(Arc::new(account))
            }
            Err(e) => {
                tracing::error!(role, index, error = %e, "Account derivation failed");
                None
            }
        }
    }

    pub fn mnemonic(&self) -> &MnemonicPhrase {
        &self.mnemonic
    }

    pub fn sender(&self) -> Option<&Arc<Account>> {
        self.sender.as_ref()
    }

    pub fn receiver(&self) -> Option<&Arc<Account>> {
        self.receiver.as_ref()
    }

    pub fn orchestrator(&self) -> &TransactionOrchestrator {
        &self.orchestrator
    }

    /// Current accounts and transfer state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            transfer_state: self.orchestrator.state(),
        }
    }

    /// Transfer state changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.orchestrator.subscribe()
    }

    fn ready_pair(&self) -> WalletResult<(Arc<Account>, Address)> {
        let sender = self
            .sender
            .clone()
            .ok_or(WalletError::AccountNotReady("sender"))?;
        let receiver = self
            .receiver
            .as_ref()
            .ok_or(WalletError::AccountNotReady("receiver"))?;
        Ok((sender, receiver.address()))
    }

    /// Fire-and-forget send from the sender to the receiver account.
    pub fn request_send(&self, amount_eth: f64) -> WalletResult<u64> {
        let (sender, receiver) = self.ready_pair()?;
        self.orchestrator.request_send(sender, receiver, amount_eth)
    }

    /// Fire-and-forget send between explicit accounts.
    pub fn request_send_between(
        &self,
        from: &Arc<Account>,
        to: &Account,
        amount_eth: f64,
    ) -> WalletResult<u64> {
        self.orchestrator
            .request_send(Arc::clone(from), to.address(), amount_eth)
    }

    /// Send from the sender to an arbitrary address and wait for the result.
    pub async fn send_to(&self, to: Address, amount_eth: f64) -> WalletResult<TransactionHash> {
        let sender = self
            .sender
            .clone()
            .ok_or(WalletError::AccountNotReady("sender"))?;
        self.orchestrator.send(&sender, to, amount_eth).await
    }

    /// Send to the receiver account and wait for the result.
    pub async fn send(&self, amount_eth: f64) -> WalletResult<TransactionHash> {
        let (sender, receiver) = self.ready_pair()?;
        self.orchestrator.send(&sender, receiver, amount_eth).await
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("sender", &self.sender.as_ref().map(|a| a.address()))
            .field("receiver", &self.receiver.as_ref().map(|a| a.address()))
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::keys::Bip44Deriver;
    use crate::blockchain::transaction::LocalTxSigner;
    use crate::blockchain::types::{SignedTransaction, UnsignedTransaction};
    use crate::ports::{Broadcaster, TransferBuilder};
    use alloy::primitives::B256;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl TransferBuilder for Unreachable {
        async fn build_transfer(
            &self,
            _from: Address,
            _to: Address,
            _amount_eth: f64,
        ) -> WalletResult<UnsignedTransaction> {
            Err(WalletError::NetworkUnavailable("offline".into()))
        }
    }

    #[async_trait]
    impl Broadcaster for Unreachable {
        async fn submit_transaction(
            &self,
            _signed: &SignedTransaction,
        ) -> WalletResult<TransactionHash> {
            Ok(TransactionHash(B256::ZERO))
        }
    }

    fn capabilities() -> ChainCapabilities {
        ChainCapabilities {
            deriver: Arc::new(Bip44Deriver::default()),
            builder: Arc::new(Unreachable),
            signer: Arc::new(LocalTxSigner),
            broadcaster: Arc::new(Unreachable),
        }
    }

    fn phrase() -> MnemonicPhrase {
        MnemonicPhrase::parse("test test test test test test test test test test test junk").unwrap()
    }

    #[tokio::test]
    async fn test_open_derives_both_accounts() {
        let session = WalletSession::open(phrase(), &capabilities(), 0, 1).await;
        let snapshot = session.snapshot();

        assert!(snapshot.is_ready());
        assert_eq!(snapshot.transfer_state, TransferState::Idle);
        assert_ne!(
            snapshot.sender.unwrap().address(),
            snapshot.receiver.unwrap().address()
        );
    }

    #[tokio::test]
    async fn test_failed_derivation_leaves_slot_unset() {
        let session = WalletSession::open(phrase(), &capabilities(), 0, u32::MAX).await;

        assert!(session.sender().is_some());
        assert!(session.receiver().is_none());
        assert!(!session.snapshot().is_ready());
        assert_eq!(
            session.request_send(0.001),
            Err(WalletError::AccountNotReady("receiver"))
        );
        assert_eq!(session.snapshot().transfer_state, TransferState::Idle);
    }

    #[tokio::test]
    async fn test_network_failure_is_captured_in_state() {
        let session = WalletSession::open(phrase(), &capabilities(), 0, 1).await;

        let err = session.send(0.001).await.unwrap_err();
        assert!(matches!(err, WalletError::NetworkUnavailable(_)));
        assert_eq!(
            session.snapshot().transfer_state,
            TransferState::Failed(WalletError::NetworkUnavailable("offline".into()))
        );
    }

    #[tokio::test]
    async fn test_account_view_hides_secrets_by_default() {
        let session = WalletSession::open(phrase(), &capabilities(), 0, 1).await;
        let sender = session.sender().unwrap();

        let hidden = AccountView::new(sender, false);
        assert_eq!(hidden.private_key, "<hidden>");

        let revealed = AccountView::new(sender, true);
        assert_eq!(revealed.private_key, sender.private_key().to_hex().as_str());
        assert_eq!(revealed.password, sender.password());

        let json = serde_json::to_value(&hidden).unwrap();
        assert_eq!(json["address"], "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(json["privateKey"], "<hidden>");
    }
}
