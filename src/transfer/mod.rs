//! Transfer lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! request_send / send
//!     → state.rs (Idle|Completed|Failed → Sending, else ConcurrentSendRejected)
//!     → orchestrator.rs pipeline:
//!         TransferBuilder → TransactionSigner → Broadcaster
//!     → state.rs (Sending → Completed(hash) | Failed(error))
//!     → TransferEvent broadcast to subscribers
//! ```

pub mod orchestrator;
pub mod state;

pub use orchestrator::TransactionOrchestrator;
pub use state::{TransferEvent, TransferState};
