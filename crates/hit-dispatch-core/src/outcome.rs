// crates/hit-dispatch-core/src/outcome.rs
// ============================================================================
// Module: Hit Outcomes
// Description: Per-hit dispatch results and the observer seam.
// Purpose: Report the terminal result of each attempted hit to callers.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every hit the engine attempts produces exactly one [`HitOutcome`], delivered
//! synchronously to each registered [`HitObserver`]. Throttled hits are
//! requeued silently and produce no outcome.
//! Invariants:
//! - Outcomes own a clone of the hit they describe.
//! - Malformed and failed outcomes are terminal; the hit is not requeued.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::Serializer;

use crate::hit::Hit;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// The endpoint accepted the hit with a success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitSent {
    /// Hit that was sent.
    pub hit: Hit,
    /// Response body returned by the endpoint.
    pub response_body: String,
}

/// The request could not be completed at the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitFailed {
    /// Hit that failed.
    pub hit: Hit,
    /// Transport error detail.
    pub error: String,
}

/// The endpoint answered with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitMalformed {
    /// Hit that was rejected.
    pub hit: Hit,
    /// HTTP status code returned.
    pub status_code: u16,
}

/// Terminal result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitOutcome {
    /// Hit accepted.
    Sent(HitSent),
    /// Transport failure.
    Failed(HitFailed),
    /// Non-success status.
    Malformed(HitMalformed),
}

impl HitOutcome {
    /// Returns the hit this outcome describes.
    #[must_use]
    pub const fn hit(&self) -> &Hit {
        match self {
            Self::Sent(sent) => &sent.hit,
            Self::Failed(failed) => &failed.hit,
            Self::Malformed(malformed) => &malformed.hit,
        }
    }

    /// Returns the outcome label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sent(_) => "sent",
            Self::Failed(_) => "failed",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Returns true when the hit was accepted.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Flat record form used when serializing outcomes.
#[derive(Serialize)]
struct OutcomeRecord<'a> {
    /// Outcome label.
    outcome: &'static str,
    /// Capture timestamp as unix milliseconds.
    captured_at_unix_ms: i128,
    /// Hit parameters.
    params: &'a crate::params::HitParams,
    /// Response body for sent hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_body: Option<&'a str>,
    /// Error detail for failed hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    /// Status code for malformed hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
}

impl Serialize for HitOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let hit = self.hit();
        let mut record = OutcomeRecord {
            outcome: self.kind(),
            captured_at_unix_ms: hit.captured_at().unix_timestamp_nanos() / 1_000_000,
            params: hit.params(),
            response_body: None,
            error: None,
            status_code: None,
        };
        match self {
            Self::Sent(sent) => record.response_body = Some(&sent.response_body),
            Self::Failed(failed) => record.error = Some(&failed.error),
            Self::Malformed(malformed) => record.status_code = Some(malformed.status_code),
        }
        record.serialize(serializer)
    }
}

// ============================================================================
// SECTION: Observer
// ============================================================================

/// Receives hit outcomes.
///
/// Observers run synchronously on the dispatching task and must not block.
pub trait HitObserver: Send + Sync {
    /// Handles a single outcome.
    fn observe(&self, outcome: &HitOutcome);
}
