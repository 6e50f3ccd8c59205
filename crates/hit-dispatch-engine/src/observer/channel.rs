// crates/hit-dispatch-engine/src/observer/channel.rs
// ============================================================================
// Module: Channel Observer
// Description: Channel-based observer for asynchronous consumers.
// Purpose: Forward hit outcomes through a Tokio mpsc channel.
// Dependencies: hit-dispatch-core, tokio, tracing
// ============================================================================

//! ## Overview
//! [`ChannelObserver`] forwards each outcome into a bounded
//! `tokio::sync::mpsc` channel without blocking the dispatching task.
//! Invariants:
//! - Each observed outcome is sent at most once.
//! - Outcomes that do not fit (full or closed channel) are dropped and logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hit_dispatch_core::HitObserver;
use hit_dispatch_core::HitOutcome;
use tokio::sync::mpsc::Sender;
use tracing::warn;

// ============================================================================
// SECTION: Channel Observer
// ============================================================================

/// Channel-based outcome observer.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    /// Sender used to forward outcomes.
    sender: Sender<HitOutcome>,
}

impl ChannelObserver {
    /// Creates an observer forwarding into `sender`.
    #[must_use]
    pub const fn new(sender: Sender<HitOutcome>) -> Self {
        Self {
            sender,
        }
    }
}

impl HitObserver for ChannelObserver {
    fn observe(&self, outcome: &HitOutcome) {
        if let Err(err) = self.sender.try_send(outcome.clone()) {
            warn!(outcome = outcome.kind(), error = %err, "hit outcome dropped by channel observer");
        }
    }
}
