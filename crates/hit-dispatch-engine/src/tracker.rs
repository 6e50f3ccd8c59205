// crates/hit-dispatch-engine/src/tracker.rs
// ============================================================================
// Module: Tracker
// Description: Per-property tracker holding session-wide parameters.
// Purpose: Merge session parameters into each hit before submission.
// Dependencies: hit-dispatch-core
// ============================================================================

//! ## Overview
//! A [`Tracker`] is bound to one property id. It keeps the parameters shared by
//! every hit it sends (protocol version, property, client, app, and display
//! details) and submits merged parameter sets to a [`HitSink`].
//! Invariants:
//! - Hit parameters override session parameters with the same key.
//! - `v` and `tid` are always present in submitted hits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use hit_dispatch_core::HitParams;

use crate::platform::Dimensions;
use crate::platform::PlatformInfo;

// ============================================================================
// SECTION: Hit Sink
// ============================================================================

/// Destination for finalized hit parameters.
pub trait HitSink: Send + Sync {
    /// Submits a parameter set for dispatch.
    fn submit(&self, params: HitParams);
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Protocol version sent with every hit.
const PROTOCOL_VERSION: &str = "1";

/// Session-scoped hit submitter for one property.
pub struct Tracker {
    /// Property the tracker reports to.
    property_id: String,
    /// Session-wide parameters.
    session: Mutex<HitParams>,
    /// Destination for submitted hits.
    sink: Arc<dyn HitSink>,
}

impl Tracker {
    /// Creates a tracker, seeding session parameters from `platform`.
    #[must_use]
    pub fn new(
        property_id: impl Into<String>,
        platform: Option<&dyn PlatformInfo>,
        sink: Arc<dyn HitSink>,
    ) -> Self {
        let property_id = property_id.into();
        let mut session = HitParams::new();
        session.insert("v", PROTOCOL_VERSION);
        session.insert("tid", property_id.as_str());
        if let Some(platform) = platform {
            session.insert("cid", platform.anonymous_client_id());
            session.insert_opt("sr", platform.screen_resolution().map(|size| size.to_string()));
            session.insert_opt("vp", platform.viewport_size().map(|size| size.to_string()));
            session.insert_opt("sd", platform.screen_colors().map(|bits| format!("{bits}-bits")));
            session.insert_opt("ul", platform.user_language());
        }
        Self {
            property_id,
            session: Mutex::new(session),
            sink,
        }
    }

    /// Returns the property id.
    #[must_use]
    pub fn property_id(&self) -> &str {
        &self.property_id
    }

    /// Sets a session parameter sent with every hit.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.session().insert(key, value);
    }

    /// Removes a session parameter.
    pub fn unset(&self, key: &str) {
        self.session().remove(key);
    }

    /// Returns a session parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.session().get(key).map(str::to_string)
    }

    /// Sets an optional session parameter, removing it when `None`.
    fn set_opt(&self, key: &str, value: Option<String>) {
        let mut session = self.session();
        match value {
            Some(value) => {
                session.insert(key, value);
            }
            None => {
                session.remove(key);
            }
        }
    }

    /// Sets the anonymous client id (`cid`).
    pub fn set_client_id(&self, client_id: impl Into<String>) {
        self.set("cid", client_id);
    }

    /// Sets or clears the user id (`uid`).
    pub fn set_user_id(&self, user_id: Option<String>) {
        self.set_opt("uid", user_id);
    }

    /// Sets or clears the application name (`an`).
    pub fn set_app_name(&self, app_name: Option<String>) {
        self.set_opt("an", app_name);
    }

    /// Sets or clears the application version (`av`).
    pub fn set_app_version(&self, app_version: Option<String>) {
        self.set_opt("av", app_version);
    }

    /// Sets or clears the application id (`aid`).
    pub fn set_app_id(&self, app_id: Option<String>) {
        self.set_opt("aid", app_id);
    }

    /// Sets or clears the application installer id (`aiid`).
    pub fn set_app_installer_id(&self, installer_id: Option<String>) {
        self.set_opt("aiid", installer_id);
    }

    /// Sets or clears the current screen name (`cd`).
    pub fn set_screen_name(&self, screen_name: Option<String>) {
        self.set_opt("cd", screen_name);
    }

    /// Sets or clears the screen resolution (`sr`).
    pub fn set_screen_resolution(&self, size: Option<Dimensions>) {
        self.set_opt("sr", size.map(|size| size.to_string()));
    }

    /// Sets or clears the viewport size (`vp`).
    pub fn set_viewport_size(&self, size: Option<Dimensions>) {
        self.set_opt("vp", size.map(|size| size.to_string()));
    }

    /// Sets or clears the user language (`ul`).
    pub fn set_language(&self, language: Option<String>) {
        self.set_opt("ul", language);
    }

    /// Enables or disables IP anonymization (`aip`).
    pub fn set_anonymize_ip(&self, anonymize: bool) {
        self.set_opt("aip", anonymize.then(|| "1".to_string()));
    }

    /// Merges session parameters under `params` and submits the result.
    pub fn send(&self, params: &HitParams) {
        let mut merged = self.session().clone();
        merged.merge(params);
        self.sink.submit(merged);
    }

    /// Locks the session parameters.
    fn session(&self) -> std::sync::MutexGuard<'_, HitParams> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
