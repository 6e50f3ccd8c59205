// crates/hit-dispatch-core/src/hit.rs
// ============================================================================
// Module: Hit Value
// Description: Immutable telemetry hit with capture timestamp.
// Purpose: Carry a finalized parameter set from builders to the engine.
// Dependencies: time
// ============================================================================

//! ## Overview
//! A [`Hit`] is one telemetry event's finalized parameter set plus the UTC time
//! it was captured. Hits are created at enqueue time and never mutated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::clock::Clock;
use crate::params::HitParams;

// ============================================================================
// SECTION: Hit
// ============================================================================

/// Immutable telemetry hit.
///
/// # Invariants
/// - `params` and `captured_at` are fixed at construction.
/// - `captured_at` is expressed in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// Finalized hit parameters.
    params: HitParams,
    /// Capture timestamp (UTC).
    captured_at: OffsetDateTime,
}

impl Hit {
    /// Creates a hit captured at the provided time.
    #[must_use]
    pub fn new(params: HitParams, captured_at: OffsetDateTime) -> Self {
        Self {
            params,
            captured_at: captured_at.to_offset(time::UtcOffset::UTC),
        }
    }

    /// Creates a hit captured at the clock's current time.
    #[must_use]
    pub fn captured_now(params: HitParams, clock: &dyn Clock) -> Self {
        Self::new(params, clock.now())
    }

    /// Returns the hit parameters.
    #[must_use]
    pub const fn params(&self) -> &HitParams {
        &self.params
    }

    /// Returns the capture timestamp.
    #[must_use]
    pub const fn captured_at(&self) -> OffsetDateTime {
        self.captured_at
    }

    /// Returns whole milliseconds elapsed between capture and `now`.
    ///
    /// Negative intervals (clock moved backwards) report zero.
    #[must_use]
    pub fn queue_time_millis(&self, now: OffsetDateTime) -> u64 {
        let elapsed = now - self.captured_at;
        u64::try_from(elapsed.whole_milliseconds()).unwrap_or(0)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
