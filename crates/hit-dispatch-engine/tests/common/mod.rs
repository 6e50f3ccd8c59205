// crates/hit-dispatch-engine/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for hit-dispatch-engine tests.
// Purpose: Provide scripted transports, clocks, and recording observers.
// Dependencies: hit-dispatch-core, hit-dispatch-engine, tokio
// ============================================================================

//! ## Overview
//! Provides a scripted [`MockTransport`], deterministic clocks, and an
//! outcome-recording observer for engine integration tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hit_dispatch_core::Clock;
use hit_dispatch_core::HitBuilder;
use hit_dispatch_core::HitObserver;
use hit_dispatch_core::HitOutcome;
use hit_dispatch_core::HitParams;
use hit_dispatch_core::Transport;
use hit_dispatch_core::TransportError;
use hit_dispatch_core::TransportRequest;
use hit_dispatch_core::TransportResponse;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Semaphore;
use tokio::sync::watch;

// ============================================================================
// SECTION: Mock Transport
// ============================================================================

/// Transport that records requests and replays scripted results.
pub struct MockTransport {
    /// Requests received so far.
    requests: Mutex<Vec<TransportRequest>>,
    /// Results returned in order before falling back to `fallback`.
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    /// Result returned once the script is exhausted.
    fallback: Result<TransportResponse, TransportError>,
    /// Optional gate each request must pass before responding.
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    /// Creates a transport answering every request with `200 ok`.
    pub fn ok() -> Arc<Self> {
        Self::with_fallback(Ok(response(200, "ok")))
    }

    /// Creates a transport answering every request with `status`.
    pub fn status(status: u16) -> Arc<Self> {
        Self::with_fallback(Ok(response(status, "")))
    }

    /// Creates a transport failing every request with `error`.
    pub fn failing(error: TransportError) -> Arc<Self> {
        Self::with_fallback(Err(error))
    }

    /// Creates a transport answering with `fallback` once the script is empty.
    pub fn with_fallback(fallback: Result<TransportResponse, TransportError>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            fallback,
            gate: None,
        })
    }

    /// Creates a `200 ok` transport whose requests wait for gate permits.
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(response(200, "ok")),
            gate: Some(Arc::clone(&gate)),
        });
        (transport, gate)
    }

    /// Queues a result for the next unscripted request.
    pub fn push(&self, result: Result<TransportResponse, TransportError>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Returns a copy of every request received.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Builds a transport response.
pub fn response(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        body: body.to_string(),
    }
}

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Fixed starting instant for deterministic clocks.
pub const EPOCH: OffsetDateTime = datetime!(2026-04-01 09:30:00 UTC);

/// Clock advancing one millisecond on every read.
pub struct TickingClock {
    /// Number of reads so far.
    reads: Mutex<i64>,
}

impl TickingClock {
    /// Creates a ticking clock starting at [`EPOCH`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reads: Mutex::new(0),
        })
    }

    /// Moves the clock forward by `millis` on top of the per-read tick.
    pub fn advance(&self, millis: i64) {
        *self.reads.lock().unwrap() += millis;
    }
}

impl Clock for TickingClock {
    fn now(&self) -> OffsetDateTime {
        let mut reads = self.reads.lock().unwrap();
        *reads += 1;
        EPOCH + time::Duration::milliseconds(*reads)
    }
}

/// Clock moved explicitly by the test.
pub struct ManualClock {
    /// Current time.
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    /// Creates a manual clock at [`EPOCH`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(EPOCH),
        })
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: time::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// SECTION: Recording Observer
// ============================================================================

/// Observer recording every outcome it sees.
pub struct RecordingObserver {
    /// Outcomes in arrival order.
    outcomes: Mutex<Vec<HitOutcome>>,
    /// Count of outcomes, for waiting.
    count: watch::Sender<usize>,
}

impl RecordingObserver {
    /// Creates an empty recording observer.
    pub fn new() -> Arc<Self> {
        let (count, _) = watch::channel(0);
        Arc::new(Self {
            outcomes: Mutex::new(Vec::new()),
            count,
        })
    }

    /// Returns a copy of the recorded outcomes.
    pub fn outcomes(&self) -> Vec<HitOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    /// Returns the number of recorded outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }

    /// Waits until at least `expected` outcomes were recorded.
    pub async fn wait_for(&self, expected: usize) {
        let mut count = self.count.subscribe();
        tokio::time::timeout(Duration::from_secs(10), count.wait_for(|seen| *seen >= expected))
            .await
            .expect("timed out waiting for outcomes")
            .expect("observer dropped");
    }
}

impl HitObserver for RecordingObserver {
    fn observe(&self, outcome: &HitOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
        self.count.send_modify(|count| *count += 1);
    }
}

// ============================================================================
// SECTION: Hit Helpers
// ============================================================================

/// Builds numbered event parameters.
pub fn event_params(index: usize) -> HitParams {
    HitBuilder::custom_event("test", "tap", Some(&format!("hit-{index}")), 0).build()
}

/// Returns the `el` label of an outcome's hit.
pub fn outcome_label(outcome: &HitOutcome) -> String {
    outcome.hit().params().get("el").unwrap_or_default().to_string()
}

// ============================================================================
// SECTION: Scheduling Helpers
// ============================================================================

/// Yields to other tasks until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0 .. 10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
