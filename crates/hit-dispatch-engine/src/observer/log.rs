// crates/hit-dispatch-engine/src/observer/log.rs
// ============================================================================
// Module: Log Observer
// Description: JSON-lines observer for audit-grade outcome records.
// Purpose: Persist one record per hit outcome.
// Dependencies: hit-dispatch-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! `LogObserver` writes each outcome as a single JSON line containing the
//! outcome label, capture time, parameters, and the outcome detail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;

use hit_dispatch_core::HitObserver;
use hit_dispatch_core::HitOutcome;
use tracing::warn;

// ============================================================================
// SECTION: Log Observer
// ============================================================================

/// JSON-lines outcome observer.
pub struct LogObserver<W: Write + Send> {
    /// Output writer for log records.
    writer: Mutex<W>,
}

impl<W: Write + Send> LogObserver<W> {
    /// Creates an observer writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the observer and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Writes one record.
    fn write_record(&self, outcome: &HitOutcome) -> Result<(), String> {
        let mut guard =
            self.writer.lock().map_err(|_| "log writer mutex poisoned".to_string())?;
        serde_json::to_writer(&mut *guard, outcome).map_err(|err| err.to_string())?;
        guard.write_all(b"\n").map_err(|err| err.to_string())?;
        guard.flush().map_err(|err| err.to_string())?;
        drop(guard);
        Ok(())
    }
}

impl<W: Write + Send> HitObserver for LogObserver<W> {
    fn observe(&self, outcome: &HitOutcome) {
        if let Err(err) = self.write_record(outcome) {
            warn!(outcome = outcome.kind(), error = %err, "hit outcome log write failed");
        }
    }
}
