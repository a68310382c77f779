//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, amounts > 0, hardened indices)
//! - Reject endpoint URLs the node client cannot use
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::blockchain::keys::HARDENED_OFFSET;
use crate::config::schema::WalletConfig;

/// Base cost of a value transfer on Ethereum.
const MIN_TRANSFER_GAS: u64 = 21_000;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.node.rpc_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "node.rpc_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("node.rpc_url", e.to_string())),
    }

    if config.node.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("node.rpc_timeout_secs", "must be greater than 0"));
    }

    if config.wallet.sender_index >= HARDENED_OFFSET {
        errors.push(ValidationError::new(
            "wallet.sender_index",
            format!("must be below {}", HARDENED_OFFSET),
        ));
    }
    if config.wallet.receiver_index >= HARDENED_OFFSET {
        errors.push(ValidationError::new(
            "wallet.receiver_index",
            format!("must be below {}", HARDENED_OFFSET),
        ));
    }
    if config.wallet.sender_index == config.wallet.receiver_index {
        errors.push(ValidationError::new(
            "wallet.receiver_index",
            "must differ from wallet.sender_index",
        ));
    }

    let amount = config.transfer.amount_eth;
    if !amount.is_finite() || amount <= 0.0 {
        errors.push(ValidationError::new(
            "transfer.amount_eth",
            "must be a positive number",
        ));
    }
    if config.transfer.gas_limit < MIN_TRANSFER_GAS {
        errors.push(ValidationError::new(
            "transfer.gas_limit",
            format!("must be at least {}", MIN_TRANSFER_GAS),
        ));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
