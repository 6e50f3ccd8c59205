// crates/hit-dispatch-core/src/settings.rs
// ============================================================================
// Module: Dispatch Settings
// Description: Per-engine dispatch and throttling settings.
// Purpose: Describe how and when queued hits are transmitted.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`DispatchSettings`] controls scheduling and the request shape;
//! [`ThrottleSettings`] sizes the engine's token bucket.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default token bucket capacity.
pub const DEFAULT_BUCKET_CAPACITY: f64 = 60.0;
/// Default token bucket fill rate in tokens per second.
pub const DEFAULT_BUCKET_FILL_RATE: f64 = 0.5;

// ============================================================================
// SECTION: Dispatch Settings
// ============================================================================

/// Dispatch behaviour for a single engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Interval between timer flushes; zero sends each hit on enqueue.
    pub dispatch_period: Duration,
    /// Whether hits may be sent at all.
    pub enabled: bool,
    /// Use the HTTPS endpoint.
    pub secure: bool,
    /// Use the validation endpoint.
    pub debug_endpoint: bool,
    /// Consult the token bucket before each batched hit.
    pub throttling_enabled: bool,
    /// Send the payload as a POST body instead of a GET query.
    pub use_http_post: bool,
    /// Append a random `z` parameter to each request.
    pub bust_cache: bool,
    /// User agent sent with each request.
    pub user_agent: Option<String>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            dispatch_period: Duration::ZERO,
            enabled: true,
            secure: true,
            debug_endpoint: false,
            throttling_enabled: false,
            use_http_post: true,
            bust_cache: false,
            user_agent: None,
        }
    }
}

// ============================================================================
// SECTION: Throttle Settings
// ============================================================================

/// Token bucket sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSettings {
    /// Maximum token balance.
    pub capacity: f64,
    /// Tokens added per second.
    pub fill_rate: f64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUCKET_CAPACITY,
            fill_rate: DEFAULT_BUCKET_FILL_RATE,
        }
    }
}
