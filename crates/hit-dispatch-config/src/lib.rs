// crates/hit-dispatch-config/src/lib.rs
// ============================================================================
// Module: Hit Dispatch Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for hit-dispatch.toml semantics.
// Dependencies: hit-dispatch-core, serde, toml
// ============================================================================

//! ## Overview
//! `hit-dispatch-config` defines the TOML configuration model for hit
//! dispatch. Loading is strict and fails closed: oversized files, overlong
//! paths, unknown keys, and out-of-range values are all rejected.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
