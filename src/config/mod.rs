//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → WalletConfig (validated, immutable)
//!     → read once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the node endpoint is never reconfigured
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The mnemonic may come from the environment instead of the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{KeysConfig, NodeConfig, ObservabilityConfig, TransferConfig, WalletConfig};
