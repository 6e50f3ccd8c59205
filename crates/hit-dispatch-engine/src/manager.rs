// crates/hit-dispatch-engine/src/manager.rs
// ============================================================================
// Module: Tracker Manager
// Description: Tracker registry fronting a dispatch engine with an opt-out gate.
// Purpose: Hand out per-property trackers and honour the app-wide opt-out.
// Dependencies: hit-dispatch-core, tracing
// ============================================================================

//! ## Overview
//! [`TrackerManager`] owns a [`DispatchEngine`], a registry of [`Tracker`]
//! values keyed by property id, and the app-wide opt-out flag. Hits submitted
//! by its trackers pass through the opt-out gate before reaching the engine.
//! Invariants:
//! - At most one tracker exists per property id.
//! - The first tracker created becomes the default tracker.
//! - While opted out, submitted hits are dropped.
//! - Opting out clears the pending queue.
//! - The opt-out flag is loaded lazily; a store that cannot be read counts as
//!   opted out until a load succeeds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use hit_dispatch_core::HitParams;
use tracing::debug;
use tracing::warn;

use crate::engine::DispatchEngine;
use crate::opt_out::MemoryOptOutStore;
use crate::opt_out::OptOutStore;
use crate::opt_out::OptOutStoreError;
use crate::platform::PlatformInfo;
use crate::tracker::HitSink;
use crate::tracker::Tracker;

// ============================================================================
// SECTION: Opt-Out Gate
// ============================================================================

/// Hit sink that drops hits while the app is opted out.
struct OptOutGate {
    /// Engine receiving admitted hits.
    engine: DispatchEngine,
    /// Persistent flag storage.
    store: Arc<dyn OptOutStore>,
    /// Cached flag; `None` until loaded.
    cached: Mutex<Option<bool>>,
}

impl OptOutGate {
    /// Returns the flag, loading it from the store on first use.
    fn opted_out(&self) -> Result<bool, OptOutStoreError> {
        let mut cached = lock(&self.cached);
        if let Some(value) = *cached {
            return Ok(value);
        }
        let value = self.store.load()?.unwrap_or(false);
        *cached = Some(value);
        drop(cached);
        Ok(value)
    }

    /// Records and persists the flag, clearing the queue when opting out.
    fn set_opted_out(&self, opted_out: bool) -> Result<(), OptOutStoreError> {
        *lock(&self.cached) = Some(opted_out);
        if opted_out {
            self.engine.clear();
        }
        self.store.store(opted_out)
    }
}

impl HitSink for OptOutGate {
    fn submit(&self, params: HitParams) {
        match self.opted_out() {
            Ok(false) => self.engine.enqueue_params(params),
            Ok(true) => debug!("hit dropped: app opted out"),
            Err(err) => warn!(error = %err, "hit dropped: opt-out state unavailable"),
        }
    }
}

// ============================================================================
// SECTION: Tracker Manager
// ============================================================================

/// Registry of trackers sharing one dispatch engine.
pub struct TrackerManager {
    /// Opt-out gate wrapping the engine.
    gate: Arc<OptOutGate>,
    /// Platform description used to seed trackers.
    platform: Arc<dyn PlatformInfo>,
    /// Trackers keyed by property id.
    trackers: Mutex<BTreeMap<String, Arc<Tracker>>>,
    /// Default tracker.
    default_tracker: Mutex<Option<Arc<Tracker>>>,
}

impl TrackerManager {
    /// Creates a manager with an in-memory opt-out store.
    #[must_use]
    pub fn new(engine: DispatchEngine, platform: Arc<dyn PlatformInfo>) -> Self {
        Self::with_opt_out_store(engine, platform, Arc::new(MemoryOptOutStore::default()))
    }

    /// Creates a manager with the given opt-out store.
    ///
    /// The engine adopts the platform user agent when it has none.
    #[must_use]
    pub fn with_opt_out_store(
        engine: DispatchEngine,
        platform: Arc<dyn PlatformInfo>,
        store: Arc<dyn OptOutStore>,
    ) -> Self {
        if engine.settings().user_agent.is_none() {
            engine.set_user_agent(platform.user_agent());
        }
        Self {
            gate: Arc::new(OptOutGate {
                engine,
                store,
                cached: Mutex::new(None),
            }),
            platform,
            trackers: Mutex::new(BTreeMap::new()),
            default_tracker: Mutex::new(None),
        }
    }

    /// Returns the dispatch engine.
    #[must_use]
    pub fn engine(&self) -> &DispatchEngine {
        &self.gate.engine
    }

    /// Returns the platform description.
    #[must_use]
    pub fn platform(&self) -> &Arc<dyn PlatformInfo> {
        &self.platform
    }

    /// Returns the tracker for `property_id`, creating it when needed.
    ///
    /// The first tracker created becomes the default tracker.
    pub fn create_tracker(&self, property_id: &str) -> Arc<Tracker> {
        let mut trackers = lock(&self.trackers);
        if let Some(existing) = trackers.get(property_id) {
            return Arc::clone(existing);
        }
        let sink: Arc<dyn HitSink> = Arc::clone(&self.gate) as Arc<dyn HitSink>;
        let tracker = Arc::new(Tracker::new(property_id, Some(self.platform.as_ref()), sink));
        trackers.insert(property_id.to_string(), Arc::clone(&tracker));
        drop(trackers);
        let mut default_tracker = lock(&self.default_tracker);
        if default_tracker.is_none() {
            *default_tracker = Some(Arc::clone(&tracker));
        }
        drop(default_tracker);
        tracker
    }

    /// Removes a tracker from the registry, clearing the default if it matches.
    pub fn close_tracker(&self, tracker: &Arc<Tracker>) {
        lock(&self.trackers).remove(tracker.property_id());
        let mut default_tracker = lock(&self.default_tracker);
        if default_tracker.as_ref().is_some_and(|current| Arc::ptr_eq(current, tracker)) {
            *default_tracker = None;
        }
    }

    /// Returns the default tracker.
    #[must_use]
    pub fn default_tracker(&self) -> Option<Arc<Tracker>> {
        lock(&self.default_tracker).clone()
    }

    /// Replaces the default tracker.
    pub fn set_default_tracker(&self, tracker: Option<Arc<Tracker>>) {
        *lock(&self.default_tracker) = tracker;
    }

    /// Returns every registered tracker ordered by property id.
    #[must_use]
    pub fn trackers(&self) -> Vec<Arc<Tracker>> {
        lock(&self.trackers).values().cloned().collect()
    }

    /// Returns the app-wide opt-out flag, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`OptOutStoreError`] when the store cannot be read.
    pub fn app_opt_out(&self) -> Result<bool, OptOutStoreError> {
        self.gate.opted_out()
    }

    /// Sets and persists the app-wide opt-out flag.
    ///
    /// Opting out clears the pending queue. The in-memory flag takes effect
    /// even when persisting fails.
    ///
    /// # Errors
    ///
    /// Returns [`OptOutStoreError`] when the store cannot be written.
    pub fn set_app_opt_out(&self, opted_out: bool) -> Result<(), OptOutStoreError> {
        self.gate.set_opted_out(opted_out)
    }

    /// Submits parameters through the opt-out gate without a tracker.
    pub fn enqueue(&self, params: HitParams) {
        self.gate.submit(params);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks a mutex, recovering the data from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
