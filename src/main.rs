//! keyflow: derive wallet accounts from a BIP-39 phrase and send transfers.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML + KEYFLOW_MNEMONIC)
//!        │
//!        ▼
//!   lifecycle::start ──▶ NodeConnection ──▶ ChainCapabilities
//!        │                                   (deriver, builder,
//!        ▼                                    signer, broadcaster)
//!   WalletSession ── sender / receiver Accounts
//!        │
//!        ▼
//!   TransactionOrchestrator: Idle → Sending → Completed | Failed
//!        │
//!        └── TransferEvent stream ──▶ this CLI (JSON lines)
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use keyflow::blockchain::types::{decode_payload, parse_address, WalletError};
use keyflow::config::load_or_default;
use keyflow::lifecycle::{shutdown_signal, start};
use keyflow::observability::{logging, metrics};
use keyflow::session::AccountView;
use keyflow::transfer::{TransferEvent, TransferState};

#[derive(Parser)]
#[command(name = "keyflow")]
#[command(about = "HD wallet accounts and single-flight transfers", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sender and receiver accounts
    Accounts {
        /// Include private keys and passwords in the output
        #[arg(long)]
        reveal: bool,
    },
    /// Send ether from the sender account
    Send {
        /// Amount in ether; defaults to transfer.amount_eth
        #[arg(short, long)]
        amount: Option<f64>,

        /// Recipient address; defaults to the receiver account
        #[arg(short, long)]
        to: Option<String>,
    },
    /// Decode a signed or unsigned transfer payload
    Decode {
        /// Hex-encoded payload, with or without 0x
        payload: String,
    },
}

/// One transition as printed to stdout.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventView {
    attempt: u64,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&TransferEvent> for EventView {
    fn from(event: &TransferEvent) -> Self {
        let (tx_hash, error) = match &event.state {
            TransferState::Completed(hash) => (Some(hash.to_string()), None),
            TransferState::Failed(err) => (None, Some(err.to_string())),
            _ => (None, None),
        };
        Self {
            attempt: event.attempt,
            state: event.state.label(),
            tx_hash,
            error,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("keyflow v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Decode { payload } => {
            print_json(&serde_json::to_value(decode_payload(&payload)?)?)?;
        }
        Commands::Accounts { reveal } => {
            let session = start(&config).await?;
            let snapshot = session.snapshot();
            print_json(&json!({
                "sender": snapshot.sender.as_deref().map(|a| AccountView::new(a, reveal)),
                "receiver": snapshot.receiver.as_deref().map(|a| AccountView::new(a, reveal)),
                "transferState": snapshot.transfer_state.label(),
            }))?;
        }
        Commands::Send { amount, to } => {
            let session = start(&config).await?;
            let amount = amount.unwrap_or(config.transfer.amount_eth);
            let to = match to {
                Some(raw) => parse_address(&raw)?,
                None => session
                    .receiver()
                    .ok_or(WalletError::AccountNotReady("receiver"))?
                    .address(),
            };

            let attempts_before = session.orchestrator().attempts();
            let mut events = session.subscribe();
            let printer = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    if let Ok(line) = serde_json::to_string(&EventView::from(&event)) {
                        println!("{}", line);
                    }
                    if event.state.is_terminal() {
                        break;
                    }
                }
            });

            // Dropping the send on interrupt settles the attempt as aborted.
            let outcome = tokio::select! {
                outcome = session.send_to(to, amount) => outcome,
                _ = shutdown_signal() => Err(WalletError::Aborted("interrupted".to_string())),
            };
            if session.orchestrator().attempts() == attempts_before {
                // Refused before any transition was published.
                printer.abort();
            }
            let _ = printer.await;

            let hash = outcome?;
            tracing::info!(tx_hash = %hash, "Done");
        }
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
