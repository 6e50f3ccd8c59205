// crates/hit-dispatch-core/src/lib.rs
// ============================================================================
// Module: Hit Dispatch Core Library
// Description: Hit model, builders, rate limiting, and dispatch interfaces.
// Purpose: Provide the backend-agnostic building blocks of hit dispatch.
// Dependencies: async-trait, rand, serde, thiserror, time, url
// ============================================================================

//! ## Overview
//! Hit Dispatch Core defines the immutable [`Hit`] value, the lineage-based
//! [`HitBuilder`], the thread-safe [`TokenBucket`] rate limiter, the wire
//! encoding used for collection requests, and the [`Transport`] and
//! [`HitObserver`] seams the dispatch engine is built on.
//! Invariants:
//! - Hits are never mutated after construction.
//! - Parameter iteration order is insertion order.
//! - Token balances never exceed bucket capacity.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod builder;
pub mod clock;
pub mod ecommerce;
pub mod hit;
pub mod outcome;
pub mod params;
pub mod settings;
pub mod token_bucket;
pub mod transport;
pub mod wire;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builder::HitBuilder;
pub use clock::Clock;
pub use clock::SystemClock;
pub use ecommerce::Product;
pub use ecommerce::ProductAction;
pub use ecommerce::ProductActionKind;
pub use ecommerce::Promotion;
pub use ecommerce::PromotionAction;
pub use hit::Hit;
pub use outcome::HitFailed;
pub use outcome::HitMalformed;
pub use outcome::HitObserver;
pub use outcome::HitOutcome;
pub use outcome::HitSent;
pub use params::HitParams;
pub use settings::DEFAULT_BUCKET_CAPACITY;
pub use settings::DEFAULT_BUCKET_FILL_RATE;
pub use settings::DispatchSettings;
pub use settings::ThrottleSettings;
pub use token_bucket::TokenBucket;
pub use token_bucket::TokenBucketError;
pub use transport::HttpMethod;
pub use transport::Transport;
pub use transport::TransportError;
pub use transport::TransportRequest;
pub use transport::TransportResponse;
pub use wire::CollectEndpoint;
pub use wire::MAX_VALUE_CHARS;
