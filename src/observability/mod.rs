//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never free-form secrets
//! - Send attempts carry their attempt number in a span
//! - Metrics are cheap (atomic increments); recording without an
//!   installed recorder is a no-op

pub mod logging;
pub mod metrics;
