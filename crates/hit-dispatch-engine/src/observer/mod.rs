// crates/hit-dispatch-engine/src/observer/mod.rs
// ============================================================================
// Module: Hit Outcome Observers
// Description: Reference observer implementations for hit outcomes.
// Purpose: Route dispatch outcomes to callbacks, channels, or audit logs.
// Dependencies: hit-dispatch-core
// ============================================================================

//! ## Overview
//! Observers receive every [`hit_dispatch_core::HitOutcome`] produced by the
//! engine. They run on the dispatching task, so implementations hand work off
//! instead of blocking.
//! Invariants:
//! - Observer failures are logged and never affect dispatch.

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod callback;
pub mod channel;
pub mod log;

pub use callback::CallbackObserver;
pub use channel::ChannelObserver;
pub use log::LogObserver;
