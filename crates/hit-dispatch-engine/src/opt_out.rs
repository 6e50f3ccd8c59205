// crates/hit-dispatch-engine/src/opt_out.rs
// ============================================================================
// Module: Opt-Out Stores
// Description: Persistence for the app-wide analytics opt-out flag.
// Purpose: Remember a user's opt-out choice across process restarts.
// Dependencies: serde, serde_json, tempfile, thiserror
// ============================================================================

//! ## Overview
//! [`OptOutStore`] loads and saves the opt-out flag. [`MemoryOptOutStore`]
//! keeps it in process memory; [`FileOptOutStore`] persists it as a small JSON
//! document.
//! Invariants:
//! - `load` returns `None` when no choice has been recorded.
//! - File writes are atomic: readers see the previous document or the new one,
//!   never a partial write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by opt-out stores.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptOutStoreError {
    /// Reading or writing the backing storage failed.
    #[error("opt-out store io error: {0}")]
    Io(String),
    /// Stored data could not be decoded.
    #[error("opt-out store parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Store Trait
// ============================================================================

/// Loads and saves the opt-out flag.
pub trait OptOutStore: Send + Sync {
    /// Returns the recorded flag, or `None` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`OptOutStoreError`] when the storage cannot be read.
    fn load(&self) -> Result<Option<bool>, OptOutStoreError>;

    /// Records the flag.
    ///
    /// # Errors
    ///
    /// Returns [`OptOutStoreError`] when the storage cannot be written.
    fn store(&self, opted_out: bool) -> Result<(), OptOutStoreError>;
}

// ============================================================================
// SECTION: Memory Store
// ============================================================================

/// In-memory opt-out store.
#[derive(Debug, Default)]
pub struct MemoryOptOutStore {
    /// Recorded flag.
    value: Mutex<Option<bool>>,
}

impl MemoryOptOutStore {
    /// Creates a store with an initial recorded value.
    #[must_use]
    pub const fn with_value(opted_out: bool) -> Self {
        Self {
            value: Mutex::new(Some(opted_out)),
        }
    }
}

impl OptOutStore for MemoryOptOutStore {
    fn load(&self) -> Result<Option<bool>, OptOutStoreError> {
        Ok(*self.value.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn store(&self, opted_out: bool) -> Result<(), OptOutStoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(opted_out);
        Ok(())
    }
}

// ============================================================================
// SECTION: File Store
// ============================================================================

/// On-disk document holding the flag.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptOutDocument {
    /// Whether the user opted out.
    app_opt_out: bool,
}

/// JSON file opt-out store.
#[derive(Debug, Clone)]
pub struct FileOptOutStore {
    /// Location of the JSON document.
    path: PathBuf,
}

impl FileOptOutStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `bytes` to a synced temporary file beside the backing file.
    ///
    /// The temporary file is removed when dropped without being persisted.
    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile, OptOutStoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|err| OptOutStoreError::Io(err.to_string()))?;
        let mut staged =
            NamedTempFile::new_in(parent).map_err(|err| OptOutStoreError::Io(err.to_string()))?;
        staged.write_all(bytes).map_err(|err| OptOutStoreError::Io(err.to_string()))?;
        staged.as_file().sync_all().map_err(|err| OptOutStoreError::Io(err.to_string()))?;
        Ok(staged)
    }
}

impl OptOutStore for FileOptOutStore {
    fn load(&self) -> Result<Option<bool>, OptOutStoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(OptOutStoreError::Io(err.to_string())),
        };
        let document: OptOutDocument = serde_json::from_slice(&bytes)
            .map_err(|err| OptOutStoreError::Parse(err.to_string()))?;
        Ok(Some(document.app_opt_out))
    }

    fn store(&self, opted_out: bool) -> Result<(), OptOutStoreError> {
        let document = OptOutDocument {
            app_opt_out: opted_out,
        };
        let bytes = serde_json::to_vec(&document)
            .map_err(|err| OptOutStoreError::Parse(err.to_string()))?;
        let staged = self.stage(&bytes)?;
        staged.persist(&self.path).map_err(|err| OptOutStoreError::Io(err.error.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
