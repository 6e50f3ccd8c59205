// crates/hit-dispatch-core/src/token_bucket.rs
// ============================================================================
// Module: Token Bucket
// Description: Thread-safe leaky-bucket rate limiter.
// Purpose: Bound the rate at which queued hits are admitted for sending.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! [`TokenBucket`] holds a fractional token balance that refills at a constant
//! rate up to a fixed capacity. Each [`TokenBucket::consume`] call refills and
//! then tests-and-decrements inside a single critical section.
//! Invariants:
//! - `0 <= tokens <= capacity` at all times.
//! - A request is admitted only when `tokens - cost > 0`; a cost equal to the
//!   remaining balance is denied.
//! - Denied requests leave the balance unchanged (apart from the refill).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use thiserror::Error;
use time::OffsetDateTime;

use crate::clock::Clock;
use crate::clock::SystemClock;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned when constructing a token bucket.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenBucketError {
    /// Capacity was not a positive finite number.
    #[error("token bucket capacity must be positive and finite (got {0})")]
    InvalidCapacity(f64),
    /// Fill rate was negative or not finite.
    #[error("token bucket fill rate must be non-negative and finite (got {0})")]
    InvalidFillRate(f64),
}

// ============================================================================
// SECTION: Token Bucket
// ============================================================================

/// Mutable bucket state guarded by the bucket lock.
#[derive(Debug)]
struct BucketState {
    /// Current token balance.
    tokens: f64,
    /// Time of the most recent refill.
    last_refill_at: OffsetDateTime,
}

/// Thread-safe token bucket rate limiter.
///
/// # Invariants
/// - `capacity` and `fill_rate` never change after construction.
/// - Refill and test-and-decrement happen under the same lock acquisition.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum token balance.
    capacity: f64,
    /// Tokens added per second.
    fill_rate: f64,
    /// Balance and refill timestamp.
    state: Mutex<BucketState>,
    /// Time source for refills.
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    /// Creates a full bucket using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`TokenBucketError`] when `capacity` or `fill_rate` is invalid.
    pub fn new(capacity: f64, fill_rate: f64) -> Result<Self, TokenBucketError> {
        Self::with_clock(capacity, fill_rate, Arc::new(SystemClock))
    }

    /// Creates a full bucket reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenBucketError`] when `capacity` or `fill_rate` is invalid.
    pub fn with_clock(
        capacity: f64,
        fill_rate: f64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenBucketError> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(TokenBucketError::InvalidCapacity(capacity));
        }
        if !fill_rate.is_finite() || fill_rate < 0.0 {
            return Err(TokenBucketError::InvalidFillRate(fill_rate));
        }
        let state = BucketState {
            tokens: capacity,
            last_refill_at: clock.now(),
        };
        Ok(Self {
            capacity,
            fill_rate,
            state: Mutex::new(state),
            clock,
        })
    }

    /// Returns the bucket capacity.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Returns the refill rate in tokens per second.
    #[must_use]
    pub const fn fill_rate(&self) -> f64 {
        self.fill_rate
    }

    /// Refills the bucket and returns the resulting balance.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    /// Attempts to take a single token.
    #[must_use]
    pub fn consume_one(&self) -> bool {
        self.consume(1.0)
    }

    /// Attempts to take `cost` tokens, returning true when admitted.
    #[must_use]
    pub fn consume(&self, cost: f64) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        if state.tokens - cost > 0.0 {
            state.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Adds tokens for the time elapsed since the last refill.
    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = (now - state.last_refill_at).as_seconds_f64();
        if elapsed > 0.0 {
            state.tokens = self.capacity.min(self.fill_rate.mul_add(elapsed, state.tokens));
        }
        state.last_refill_at = now;
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
