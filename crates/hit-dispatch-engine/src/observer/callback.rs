// crates/hit-dispatch-engine/src/observer/callback.rs
// ============================================================================
// Module: Callback Observer
// Description: Closure-backed outcome observer.
// Purpose: Invoke a user-provided function for each hit outcome.
// Dependencies: hit-dispatch-core
// ============================================================================

//! ## Overview
//! [`CallbackObserver`] wraps a closure so callers can react to outcomes
//! without defining an observer type.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use hit_dispatch_core::HitObserver;
use hit_dispatch_core::HitOutcome;

// ============================================================================
// SECTION: Callback Observer
// ============================================================================

/// Handler signature used by the observer.
type OutcomeHandler = dyn Fn(&HitOutcome) + Send + Sync;

/// Closure-backed outcome observer.
#[derive(Clone)]
pub struct CallbackObserver {
    /// Handler invoked with each outcome.
    handler: Arc<OutcomeHandler>,
}

impl CallbackObserver {
    /// Creates an observer from a handler function.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HitOutcome) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl HitObserver for CallbackObserver {
    fn observe(&self, outcome: &HitOutcome) {
        (self.handler)(outcome);
    }
}
