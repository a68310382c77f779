//! Collaborator ports.
//!
//! The narrow capability surface the session and the transfer orchestrator
//! consume. Any backing implementation (local signer, hardware device,
//! remote service) can satisfy these; the core never assumes how derivation,
//! encoding or signing work internally.
//!
//! | Port | Input | Output |
//! |---|---|---|
//! | [`KeyDeriver`] | mnemonic, index | [`Account`] |
//! | [`TransferBuilder`] | from, to, amount | [`UnsignedTransaction`] |
//! | [`TransactionSigner`] | private key, unsigned | [`SignedTransaction`] |
//! | [`Broadcaster`] | signed | [`TransactionHash`] |

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::blockchain::keys::{Account, DerivationIndex, MnemonicPhrase, PrivateKey};
use crate::blockchain::types::{
    SignedTransaction, TransactionHash, UnsignedTransaction, WalletResult,
};

/// Turns (mnemonic, index) into an Account. Must be deterministic.
#[async_trait]
pub trait KeyDeriver: Send + Sync {
    async fn derive(&self, mnemonic: &MnemonicPhrase, index: DerivationIndex)
        -> WalletResult<Account>;
}

/// Turns (from, to, amount in ether) into an unsigned transfer.
#[async_trait]
pub trait TransferBuilder: Send + Sync {
    async fn build_transfer(
        &self,
        from: Address,
        to: Address,
        amount_eth: f64,
    ) -> WalletResult<UnsignedTransaction>;
}

/// Authorizes an unsigned transfer. Must not retain the key.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_transaction(
        &self,
        key: &PrivateKey,
        unsigned: &UnsignedTransaction,
    ) -> WalletResult<SignedTransaction>;
}

/// Submits a signed transfer to the network. Never retries.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn submit_transaction(&self, signed: &SignedTransaction) -> WalletResult<TransactionHash>;
}

/// The full set of collaborators one session talks to.
#[derive(Clone)]
pub struct ChainCapabilities {
    pub deriver: Arc<dyn KeyDeriver>,
    pub builder: Arc<dyn TransferBuilder>,
    pub signer: Arc<dyn TransactionSigner>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl std::fmt::Debug for ChainCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainCapabilities").finish_non_exhaustive()
    }
}
