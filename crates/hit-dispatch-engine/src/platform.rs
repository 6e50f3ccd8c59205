// crates/hit-dispatch-engine/src/platform.rs
// ============================================================================
// Module: Platform Information
// Description: Host environment details used to seed tracker sessions.
// Purpose: Supply client id, display, and locale parameters to trackers.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! [`PlatformInfo`] is the seam through which a host application describes
//! itself. [`StaticPlatformInfo`] holds fixed values, suitable for services,
//! command-line tools, and tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Dimensions
// ============================================================================

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Creates a dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ============================================================================
// SECTION: Platform Info
// ============================================================================

/// Describes the environment hits originate from.
///
/// Values are read once when a tracker is created. Hosts whose screen or
/// viewport size changes afterwards must push the new values with
/// [`Tracker::set_screen_resolution`](crate::tracker::Tracker::set_screen_resolution)
/// and [`Tracker::set_viewport_size`](crate::tracker::Tracker::set_viewport_size).
pub trait PlatformInfo: Send + Sync {
    /// Stable anonymous identifier for this installation.
    fn anonymous_client_id(&self) -> String;

    /// Screen resolution, when known.
    fn screen_resolution(&self) -> Option<Dimensions> {
        None
    }

    /// Viewport size, when known.
    fn viewport_size(&self) -> Option<Dimensions> {
        None
    }

    /// Screen colour depth in bits, when known.
    fn screen_colors(&self) -> Option<u32> {
        None
    }

    /// User language tag, when known.
    fn user_language(&self) -> Option<String> {
        None
    }

    /// User agent sent with each request, when known.
    fn user_agent(&self) -> Option<String> {
        None
    }
}

/// Fixed platform description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPlatformInfo {
    /// Anonymous client identifier.
    pub client_id: String,
    /// Screen resolution.
    pub screen_resolution: Option<Dimensions>,
    /// Viewport size.
    pub viewport_size: Option<Dimensions>,
    /// Screen colour depth.
    pub screen_colors: Option<u32>,
    /// User language tag.
    pub user_language: Option<String>,
    /// User agent.
    pub user_agent: Option<String>,
}

impl StaticPlatformInfo {
    /// Creates a description with the given client id and nothing else.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            screen_resolution: None,
            viewport_size: None,
            screen_colors: None,
            user_language: None,
            user_agent: None,
        }
    }

    /// Creates a description with a freshly generated client id.
    #[must_use]
    pub fn generated() -> Self {
        Self::new(generate_client_id())
    }
}

impl PlatformInfo for StaticPlatformInfo {
    fn anonymous_client_id(&self) -> String {
        self.client_id.clone()
    }

    fn screen_resolution(&self) -> Option<Dimensions> {
        self.screen_resolution
    }

    fn viewport_size(&self) -> Option<Dimensions> {
        self.viewport_size
    }

    fn screen_colors(&self) -> Option<u32> {
        self.screen_colors
    }

    fn user_language(&self) -> Option<String> {
        self.user_language.clone()
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }
}

// ============================================================================
// SECTION: Client Ids
// ============================================================================

/// Generates a random version 4 UUID string for use as a client id.
#[must_use]
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
