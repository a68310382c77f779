//! Single-flight transfer orchestration.
//!
//! # Responsibilities
//! - Run build → sign → broadcast strictly in order for one attempt
//! - Refuse a new attempt while one is `Sending`
//! - Publish every transition, in order, to subscribers
//!
//! # Design Decisions
//! - The `→ Sending` check-and-set happens under one mutex, so concurrent
//!   callers on a multi-threaded runtime still see a single winner
//! - Each attempt owns a guard; if the attempt is dropped or its task
//!   panics before settling, the guard settles it as `Failed(Aborted)`
//! - No retries: an accepted attempt always ends in exactly one terminal
//!   state

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::Address;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::blockchain::keys::Account;
use crate::blockchain::types::{TransactionHash, WalletError, WalletResult};
use crate::observability::metrics;
use crate::ports::{Broadcaster, ChainCapabilities, TransactionSigner, TransferBuilder};
use crate::transfer::state::{TransferEvent, TransferState};

/// Buffered transitions per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Drives transfers through the collaborators and owns their state.
pub struct TransactionOrchestrator {
    pipeline: Pipeline,
    lifecycle: Arc<Lifecycle>,
}

impl TransactionOrchestrator {
    pub fn new(
        builder: Arc<dyn TransferBuilder>,
        signer: Arc<dyn TransactionSigner>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            pipeline: Pipeline {
                builder,
                signer,
                broadcaster,
            },
            lifecycle: Arc::new(Lifecycle {
                inner: Mutex::new(Inner::default()),
                events,
            }),
        }
    }

    pub fn from_capabilities(capabilities: &ChainCapabilities) -> Self {
        Self::new(
            Arc::clone(&capabilities.builder),
            Arc::clone(&capabilities.signer),
            Arc::clone(&capabilities.broadcaster),
        )
    }

    /// Current state snapshot.
    pub fn state(&self) -> TransferState {
        self.lifecycle.inner.lock().state.clone()
    }

    /// Number of attempts accepted so far.
    pub fn attempts(&self) -> u64 {
        self.lifecycle.inner.lock().attempt
    }

    /// Receive every transition published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.lifecycle.events.subscribe()
    }

    /// Run one attempt to its terminal state.
    ///
    /// Returns `ConcurrentSendRejected` without touching state if an
    /// attempt is already in flight.
    pub async fn send(
        &self,
        from: &Account,
        to: Address,
        amount_eth: f64,
    ) -> WalletResult<TransactionHash> {
        let guard = self.lifecycle.begin()?;
        let span = transfer_span(guard.attempt, from, to);
        let outcome = self.pipeline.run(from, to, amount_eth).instrument(span).await;
        guard.settle(outcome)
    }

    /// Start an attempt and return immediately with its number.
    ///
    /// The outcome is only observable through [`Self::state`] and
    /// [`Self::subscribe`]. Must be called from within a Tokio runtime.
    pub fn request_send(
        &self,
        from: Arc<Account>,
        to: Address,
        amount_eth: f64,
    ) -> WalletResult<u64> {
        let runtime = Handle::try_current()
            .map_err(|e| WalletError::Aborted(format!("No runtime to drive the transfer: {}", e)))?;

        let guard = self.lifecycle.begin()?;
        let attempt = guard.attempt;
        let span = transfer_span(attempt, &from, to);
        let pipeline = self.pipeline.clone();

        runtime.spawn(
            async move {
                let outcome = pipeline.run(&from, to, amount_eth).await;
                let _ = guard.settle(outcome);
            }
            .instrument(span),
        );

        Ok(attempt)
    }

    /// Wait until no attempt is in flight and return the resulting state.
    pub async fn wait_settled(&self) -> TransferState {
        let mut events = self.subscribe();
        let current = self.state();
        if !current.is_sending() {
            return current;
        }
        loop {
            match events.recv().await {
                Ok(event) if event.state.is_terminal() => return event.state,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let current = self.state();
                    if !current.is_sending() {
                        return current;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return self.state(),
            }
        }
    }
}

impl std::fmt::Debug for TransactionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lifecycle.inner.lock();
        f.debug_struct("TransactionOrchestrator")
            .field("state", &inner.state)
            .field("attempt", &inner.attempt)
            .finish()
    }
}

fn transfer_span(attempt: u64, from: &Account, to: Address) -> tracing::Span {
    tracing::info_span!("transfer", attempt, from = %from.address(), to = %to)
}

/// The three collaborator steps, cheap to clone into a task.
#[derive(Clone)]
struct Pipeline {
    builder: Arc<dyn TransferBuilder>,
    signer: Arc<dyn TransactionSigner>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Pipeline {
    async fn run(
        &self,
        from: &Account,
        to: Address,
        amount_eth: f64,
    ) -> WalletResult<TransactionHash> {
        let unsigned = self
            .builder
            .build_transfer(from.address(), to, amount_eth)
            .await?;
        tracing::debug!("Transfer built");

        let signed = self
            .signer
            .sign_transaction(from.private_key(), &unsigned)
            .await?;
        tracing::debug!(expected_hash = %signed.hash(), "Transfer signed");

        self.broadcaster.submit_transaction(&signed).await
    }
}

#[derive(Default)]
struct Inner {
    state: TransferState,
    attempt: u64,
    started: Option<Instant>,
}

struct Lifecycle {
    inner: Mutex<Inner>,
    events: broadcast::Sender<TransferEvent>,
}

impl Lifecycle {
    fn begin(self: &Arc<Self>) -> WalletResult<AttemptGuard> {
        let mut inner = self.inner.lock();
        let next = match inner.state.begin() {
            Ok(next) => next,
            Err(e) => {
                metrics::record_rejected_send();
                tracing::warn!(attempt = inner.attempt, "Send rejected: transfer already in flight");
                return Err(e);
            }
        };

        inner.attempt += 1;
        inner.state = next.clone();
        inner.started = Some(Instant::now());
        self.publish(inner.attempt, next);

        Ok(AttemptGuard {
            lifecycle: Arc::clone(self),
            attempt: inner.attempt,
            settled: false,
        })
    }

    fn settle(&self, attempt: u64, outcome: &WalletResult<TransactionHash>) {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt {
            return;
        }
        let Some(next) = inner.state.settle(outcome.clone()) else {
            return;
        };

        match &next {
            TransferState::Completed(hash) => tracing::info!(attempt, tx_hash = %hash, "Transfer completed"),
            TransferState::Failed(err) => tracing::warn!(attempt, error = %err, "Transfer failed"),
            _ => {}
        }
        if let Some(started) = inner.started.take() {
            metrics::record_transfer_duration(started.elapsed());
        }
        inner.state = next.clone();
        self.publish(attempt, next);
    }

    // Called with the state lock held so events leave in transition order.
    fn publish(&self, attempt: u64, state: TransferState) {
        metrics::record_transition(state.label());
        let _ = self.events.send(TransferEvent { attempt, state });
    }
}

/// Settles its attempt exactly once, even if never settled explicitly.
struct AttemptGuard {
    lifecycle: Arc<Lifecycle>,
    attempt: u64,
    settled: bool,
}

impl AttemptGuard {
    fn settle(mut self, outcome: WalletResult<TransactionHash>) -> WalletResult<TransactionHash> {
        self.settled = true;
        self.lifecycle.settle(self.attempt, &outcome);
        outcome
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.lifecycle.settle(
                self.attempt,
                &Err(WalletError::Aborted(
                    "attempt ended before reaching a terminal state".to_string(),
                )),
            );
        }
    }
}
