//! Chain-facing subsystem.
//!
//! # Data Flow
//! ```text
//! Mnemonic phrase + index
//!     → keys.rs (BIP-39 seed, BIP-44 path, account material)
//! Sender, receiver, amount
//!     → transaction.rs (build via client.rs, sign locally, broadcast)
//!     → client.rs (single RPC endpoint with timeouts)
//! ```
//!
//! # Security Constraints
//! - The phrase and private keys are zeroized on drop
//! - Secrets never reach `Debug` output or logs
//! - Every RPC call has a configurable timeout

pub mod client;
pub mod keys;
pub mod transaction;
pub mod types;

pub use client::NodeConnection;
pub use keys::{Account, Bip44Deriver, DerivationIndex, MnemonicPhrase, PrivateKey};
pub use transaction::{LocalTxSigner, NodeBroadcaster, TxBuilder};
pub use types::{
    decode_payload, DecodedPayload, DecodedTransaction, SignedTransaction, TransactionHash,
    UnsignedTransaction, WalletError, WalletResult,
};
