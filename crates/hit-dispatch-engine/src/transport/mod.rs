// crates/hit-dispatch-engine/src/transport/mod.rs
// ============================================================================
// Module: Transports
// Description: Concrete transport implementations.
// Purpose: Perform collection requests over real network clients.
// Dependencies: hit-dispatch-core
// ============================================================================

//! ## Overview
//! Concrete [`hit_dispatch_core::Transport`] implementations.

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod http;

pub use http::HttpTransport;
pub use http::HttpTransportConfig;
