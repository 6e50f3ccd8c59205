// crates/hit-dispatch-engine/src/lib.rs
// ============================================================================
// Module: Hit Dispatch Engine Library
// Description: Dispatch engine, trackers, observers, and HTTP transport.
// Purpose: Queue, rate limit, and transmit hits to the collection endpoint.
// Dependencies: hit-dispatch-core, reqwest, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! Hit Dispatch Engine provides the [`DispatchEngine`] scheduler, ready-made
//! [`hit_dispatch_core::HitObserver`] implementations, the reqwest-backed
//! [`HttpTransport`], and the [`TrackerManager`] that fronts the engine with
//! per-property [`Tracker`] values and an app-wide opt-out gate.
//! Invariants:
//! - Every attempted hit produces exactly one outcome notification.
//! - Throttled hits are requeued, never dropped.
//! - No lock is held across network I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod manager;
pub mod observer;
pub mod opt_out;
pub mod platform;
pub mod tracker;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::DispatchEngine;
pub use engine::DispatchEngineBuilder;
pub use engine::EngineError;
pub use manager::TrackerManager;
pub use observer::CallbackObserver;
pub use observer::ChannelObserver;
pub use observer::LogObserver;
pub use opt_out::FileOptOutStore;
pub use opt_out::MemoryOptOutStore;
pub use opt_out::OptOutStore;
pub use opt_out::OptOutStoreError;
pub use platform::Dimensions;
pub use platform::PlatformInfo;
pub use platform::StaticPlatformInfo;
pub use tracker::HitSink;
pub use tracker::Tracker;
pub use transport::HttpTransport;
pub use transport::HttpTransportConfig;
