// crates/hit-dispatch-core/src/clock.rs
// ============================================================================
// Module: Hit Dispatch Clock
// Description: Wall-clock source used for capture times and token refills.
// Purpose: Keep time reads behind a seam so tests can drive time explicitly.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Hit capture timestamps, the `qt` queue-time parameter, and token bucket
//! refills all read UTC wall-clock time through [`Clock`]. Production code uses
//! [`SystemClock`]; tests substitute deterministic implementations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use time::OffsetDateTime;

// ============================================================================
// SECTION: Clock Trait
// ============================================================================

/// Source of UTC wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system's UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

impl fmt::Debug for dyn Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}
