//! Wallet key derivation and transfer lifecycle library.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod ports;
pub mod session;
pub mod transfer;

pub use blockchain::{WalletError, WalletResult};
pub use config::schema::WalletConfig;
pub use session::{SessionSnapshot, WalletSession};
pub use transfer::{TransactionOrchestrator, TransferState};
