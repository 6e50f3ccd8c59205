// crates/hit-dispatch-engine/src/engine.rs
// ============================================================================
// Module: Dispatch Engine
// Description: Pending queue, rate limiting, timer, and in-flight bookkeeping.
// Purpose: Decide when queued hits are sent and report their outcomes.
// Dependencies: hit-dispatch-core, tokio, tracing
// ============================================================================

//! ## Overview
//! [`DispatchEngine`] owns the pending hit queue, the token bucket, the
//! periodic flush timer, and the set of in-flight dispatch operations. With a
//! zero dispatch period each enqueued hit is sent at once; otherwise hits wait
//! in the queue until a timer tick or an explicit [`DispatchEngine::flush`].
//! Invariants:
//! - A flush drains the queue atomically, so no two batches share a hit.
//! - A flush waits for every dispatch operation in flight when it starts.
//! - Dispatch operations run as spawned tasks and finish even when the caller
//!   awaiting them is dropped.
//! - In-flight membership is released on completion, panic, or cancellation.
//! - No lock is held across an `await` point.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;
use std::time::Duration;

use hit_dispatch_core::Clock;
use hit_dispatch_core::CollectEndpoint;
use hit_dispatch_core::DispatchSettings;
use hit_dispatch_core::Hit;
use hit_dispatch_core::HitFailed;
use hit_dispatch_core::HitMalformed;
use hit_dispatch_core::HitObserver;
use hit_dispatch_core::HitOutcome;
use hit_dispatch_core::HitParams;
use hit_dispatch_core::HitSent;
use hit_dispatch_core::HttpMethod;
use hit_dispatch_core::SystemClock;
use hit_dispatch_core::ThrottleSettings;
use hit_dispatch_core::TokenBucket;
use hit_dispatch_core::TokenBucketError;
use hit_dispatch_core::Transport;
use hit_dispatch_core::wire;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::tracker::HitSink;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned when constructing a dispatch engine.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No transport was configured.
    #[error("dispatch engine transport is not configured")]
    MissingTransport,
    /// No Tokio runtime was supplied or active at build time.
    #[error("dispatch engine requires a tokio runtime")]
    NoRuntime,
    /// Throttle settings were rejected by the token bucket.
    #[error("invalid throttle settings: {0}")]
    Throttle(#[from] TokenBucketError),
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for a dispatch engine.
///
/// # Invariants
/// - `build` succeeds only with a transport and a reachable runtime.
pub struct DispatchEngineBuilder {
    /// Transport used for every request.
    transport: Option<Arc<dyn Transport>>,
    /// Initial dispatch settings.
    settings: DispatchSettings,
    /// Token bucket sizing.
    throttle: ThrottleSettings,
    /// Time source for capture times, `qt`, and refills.
    clock: Arc<dyn Clock>,
    /// Observers registered before construction.
    observers: Vec<Arc<dyn HitObserver>>,
    /// Runtime used to spawn dispatch tasks.
    runtime: Option<Handle>,
}

impl Default for DispatchEngineBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            settings: DispatchSettings::default(),
            throttle: ThrottleSettings::default(),
            clock: Arc::new(SystemClock),
            observers: Vec::new(),
            runtime: None,
        }
    }
}

impl DispatchEngineBuilder {
    /// Sets the transport.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a shared transport.
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the initial dispatch settings.
    #[must_use]
    pub fn settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the token bucket sizing.
    #[must_use]
    pub const fn throttle(mut self, throttle: ThrottleSettings) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers an outcome observer.
    #[must_use]
    pub fn observer(mut self, observer: impl HitObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Sets the runtime used for dispatch tasks.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the engine, starting the timer when the period is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the transport or runtime is missing or the
    /// throttle settings are invalid.
    pub fn build(self) -> Result<DispatchEngine, EngineError> {
        let transport = self.transport.ok_or(EngineError::MissingTransport)?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| EngineError::NoRuntime)?,
        };
        let bucket = TokenBucket::with_clock(
            self.throttle.capacity,
            self.throttle.fill_rate,
            Arc::clone(&self.clock),
        )?;
        let period = self.settings.dispatch_period;
        let inner = Arc::new(EngineInner {
            queue: Mutex::new(VecDeque::new()),
            bucket,
            settings: Mutex::new(self.settings),
            timer: Mutex::new(None),
            in_flight: Mutex::new(InFlightSet::default()),
            observers: Mutex::new(self.observers),
            transport,
            clock: self.clock,
            runtime,
        });
        if !period.is_zero() {
            inner.start_timer(period);
        }
        Ok(DispatchEngine {
            inner,
        })
    }
}

// ============================================================================
// SECTION: Dispatch Engine
// ============================================================================

/// Scheduler that queues and transmits hits.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct DispatchEngine {
    /// Shared engine state.
    inner: Arc<EngineInner>,
}

impl DispatchEngine {
    /// Returns a builder for the engine.
    #[must_use]
    pub fn builder() -> DispatchEngineBuilder {
        DispatchEngineBuilder::default()
    }

    /// Sends the hit now or queues it, depending on the period and enabled flag.
    ///
    /// Never blocks on network I/O.
    pub fn enqueue(&self, hit: Hit) {
        let settings = self.inner.settings();
        if settings.dispatch_period.is_zero() && settings.enabled {
            let inner = Arc::clone(&self.inner);
            drop(self.inner.spawn_tracked(async move {
                inner.dispatch_immediate(hit).await;
            }));
        } else {
            lock(&self.inner.queue).push_back(hit);
        }
    }

    /// Captures `params` as a hit at the engine clock's current time and enqueues it.
    pub fn enqueue_params(&self, params: HitParams) {
        self.enqueue(Hit::captured_now(params, self.inner.clock.as_ref()));
    }

    /// Sends every queued hit, returning once that batch has completed.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Flushes the queue and stops the periodic timer.
    pub async fn suspend(&self) {
        self.inner.flush().await;
        if self.inner.stop_timer() {
            info!("dispatch timer stopped for suspend");
        }
    }

    /// Restarts the periodic timer when the dispatch period is non-zero.
    pub fn resume(&self) {
        let period = self.inner.settings().dispatch_period;
        if !period.is_zero() {
            self.inner.start_timer(period);
        }
    }

    /// Empties the queue without notifying observers.
    ///
    /// Dispatch operations already in flight are not affected.
    pub fn clear(&self) {
        let dropped = {
            let mut queue = lock(&self.inner.queue);
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        debug!(dropped, "pending hit queue cleared");
    }

    /// Enables or disables sending.
    ///
    /// Enabling a disabled engine starts a background flush.
    pub fn set_enabled(&self, enabled: bool) {
        let changed = {
            let mut settings = lock(&self.inner.settings);
            let changed = settings.enabled != enabled;
            settings.enabled = enabled;
            changed
        };
        if changed && enabled {
            let inner = Arc::clone(&self.inner);
            drop(self.inner.runtime.spawn(async move {
                inner.flush().await;
            }));
        }
    }

    /// Changes the dispatch period, replacing the timer when it changes.
    pub fn set_dispatch_period(&self, period: Duration) {
        {
            let mut settings = lock(&self.inner.settings);
            if settings.dispatch_period == period {
                return;
            }
            settings.dispatch_period = period;
        }
        self.inner.stop_timer();
        if !period.is_zero() {
            self.inner.start_timer(period);
        }
    }

    /// Selects the HTTPS or HTTP endpoint.
    pub fn set_secure(&self, secure: bool) {
        lock(&self.inner.settings).secure = secure;
    }

    /// Selects the validation endpoint.
    pub fn set_debug_endpoint(&self, debug_endpoint: bool) {
        lock(&self.inner.settings).debug_endpoint = debug_endpoint;
    }

    /// Enables token bucket throttling for batched hits.
    pub fn set_throttling_enabled(&self, throttling_enabled: bool) {
        lock(&self.inner.settings).throttling_enabled = throttling_enabled;
    }

    /// Selects POST bodies or GET queries.
    pub fn set_use_http_post(&self, use_http_post: bool) {
        lock(&self.inner.settings).use_http_post = use_http_post;
    }

    /// Enables the random `z` parameter.
    pub fn set_bust_cache(&self, bust_cache: bool) {
        lock(&self.inner.settings).bust_cache = bust_cache;
    }

    /// Sets the user agent sent with each request.
    pub fn set_user_agent(&self, user_agent: Option<String>) {
        lock(&self.inner.settings).user_agent = user_agent;
    }

    /// Returns a snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> DispatchSettings {
        self.inner.settings()
    }

    /// Returns true when sending is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        lock(&self.inner.settings).enabled
    }

    /// Returns the current dispatch period.
    #[must_use]
    pub fn dispatch_period(&self) -> Duration {
        lock(&self.inner.settings).dispatch_period
    }

    /// Registers an outcome observer.
    pub fn add_observer(&self, observer: Arc<dyn HitObserver>) {
        lock(&self.inner.observers).push(observer);
    }

    /// Returns the number of queued hits.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    /// Returns the number of dispatch operations in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        lock(&self.inner.in_flight).ops.len()
    }

    /// Returns true while the periodic timer is running.
    #[must_use]
    pub fn timer_active(&self) -> bool {
        lock(&self.inner.timer).as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Returns the engine's clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }
}

impl HitSink for DispatchEngine {
    fn submit(&self, params: HitParams) {
        self.enqueue_params(params);
    }
}

// ============================================================================
// SECTION: Engine State
// ============================================================================

/// In-flight dispatch operations keyed by sequence number.
#[derive(Default)]
struct InFlightSet {
    /// Next operation identifier.
    next_id: u64,
    /// Completion signals for running operations.
    ops: BTreeMap<u64, watch::Receiver<bool>>,
}

/// Shared state behind every engine handle.
struct EngineInner {
    /// Pending hits in FIFO order.
    queue: Mutex<VecDeque<Hit>>,
    /// Rate limiter consulted for batched hits.
    bucket: TokenBucket,
    /// Current dispatch settings.
    settings: Mutex<DispatchSettings>,
    /// Periodic flush task.
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Running dispatch operations.
    in_flight: Mutex<InFlightSet>,
    /// Outcome observers.
    observers: Mutex<Vec<Arc<dyn HitObserver>>>,
    /// Transport for every request.
    transport: Arc<dyn Transport>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Runtime that owns dispatch and timer tasks.
    runtime: Handle,
}

impl EngineInner {
    /// Returns a snapshot of the settings.
    fn settings(&self) -> DispatchSettings {
        lock(&self.settings).clone()
    }

    /// Runs one flush cycle.
    async fn flush(self: &Arc<Self>) {
        if !lock(&self.settings).enabled {
            return;
        }
        self.wait_in_flight().await;
        if !lock(&self.settings).enabled {
            return;
        }
        let batch = std::mem::take(&mut *lock(&self.queue));
        if batch.is_empty() {
            return;
        }
        debug!(hits = batch.len(), "flushing pending hits");
        let inner = Arc::clone(self);
        let task = self.spawn_tracked(async move {
            inner.dispatch_batch(batch).await;
        });
        if let Err(err) = task.await {
            warn!(error = %err, "hit batch task did not complete");
        }
    }

    /// Waits for every dispatch operation currently in flight.
    async fn wait_in_flight(&self) {
        let pending: Vec<watch::Receiver<bool>> =
            lock(&self.in_flight).ops.values().cloned().collect();
        for mut done in pending {
            // A closed channel means the operation already finished.
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Registers a dispatch operation and spawns it on the runtime.
    fn spawn_tracked<F>(self: &Arc<Self>, operation: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done, receiver) = watch::channel(false);
        let id = {
            let mut set = lock(&self.in_flight);
            let id = set.next_id;
            set.next_id = set.next_id.wrapping_add(1);
            set.ops.insert(id, receiver);
            id
        };
        let guard = InFlightGuard {
            inner: Arc::clone(self),
            id,
            done,
        };
        self.runtime.spawn(async move {
            let _guard = guard;
            operation.await;
        })
    }

    /// Sends queued hits in order, requeueing those the bucket denies.
    async fn dispatch_batch(&self, batch: VecDeque<Hit>) {
        let now = self.clock.now();
        let mut requeued = 0_usize;
        for hit in batch {
            let settings = self.settings();
            if settings.enabled && (!settings.throttling_enabled || self.bucket.consume_one()) {
                let params = wire::materialize(
                    &hit,
                    now,
                    settings.bust_cache.then(wire::cache_buster),
                );
                self.send(hit, &params, &settings).await;
            } else {
                lock(&self.queue).push_back(hit);
                requeued += 1;
            }
        }
        if requeued > 0 {
            debug!(requeued, "hits returned to the pending queue");
        }
    }

    /// Sends a single hit that bypassed the queue.
    async fn dispatch_immediate(&self, hit: Hit) {
        let settings = self.settings();
        let mut params = hit.params().clone();
        params.insert_opt(
            wire::CACHE_BUSTER_KEY,
            settings.bust_cache.then(|| wire::cache_buster().to_string()),
        );
        self.send(hit, &params, &settings).await;
    }

    /// Performs the request for one hit and notifies observers.
    async fn send(&self, hit: Hit, params: &HitParams, settings: &DispatchSettings) {
        let endpoint = CollectEndpoint::select(settings.secure, settings.debug_endpoint);
        let method = if settings.use_http_post { HttpMethod::Post } else { HttpMethod::Get };
        let request =
            wire::build_request(endpoint, method, params, settings.user_agent.as_deref());
        let outcome = match self.transport.send(request).await {
            Ok(response) if response.is_success() => HitOutcome::Sent(HitSent {
                hit,
                response_body: response.body,
            }),
            Ok(response) => {
                warn!(status = response.status, "collection endpoint rejected hit");
                HitOutcome::Malformed(HitMalformed {
                    hit,
                    status_code: response.status,
                })
            }
            Err(err) => {
                warn!(error = %err, "hit dispatch failed");
                HitOutcome::Failed(HitFailed {
                    hit,
                    error: err.to_string(),
                })
            }
        };
        self.notify(&outcome);
    }

    /// Delivers an outcome to every observer outside the observer lock.
    fn notify(&self, outcome: &HitOutcome) {
        let observers: Vec<Arc<dyn HitObserver>> = lock(&self.observers).clone();
        for observer in observers {
            observer.observe(outcome);
        }
    }

    /// Starts (or replaces) the periodic flush timer.
    fn start_timer(self: &Arc<Self>, period: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.flush().await;
            }
        });
        let previous = lock(&self.timer).replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        info!(period_ms, "dispatch timer started");
    }

    /// Stops the periodic timer, returning true when one was running.
    fn stop_timer(&self) -> bool {
        let previous = lock(&self.timer).take();
        match previous {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            timer.abort();
        }
    }
}

/// Releases an in-flight registration when its task ends.
struct InFlightGuard {
    /// Engine owning the in-flight set.
    inner: Arc<EngineInner>,
    /// Operation identifier.
    id: u64,
    /// Completion signal.
    done: watch::Sender<bool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.done.send_replace(true);
        lock(&self.inner.in_flight).ops.remove(&self.id);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks a mutex, recovering the data from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
