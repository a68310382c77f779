//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Configure node → Resolve phrase → Derive accounts → Session
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Cancel the in-flight await
//! ```
//!
//! # Design Decisions
//! - Fail fast on configuration and phrase errors
//! - Account derivation failures are not fatal; the account is left unset

pub mod signals;
pub mod startup;

pub use signals::shutdown_signal;
pub use startup::{build_capabilities, start};
