// crates/hit-dispatch-core/src/wire.rs
// ============================================================================
// Module: Wire Encoding
// Description: Endpoint selection and payload encoding for collection requests.
// Purpose: Turn a hit into the exact bytes sent to the collection endpoint.
// Dependencies: rand, time, url
// ============================================================================

//! ## Overview
//! Payloads are `key=value` pairs joined by `&` in parameter order. Keys are
//! written verbatim. Values are truncated to [`MAX_VALUE_CHARS`] characters and
//! then percent-encoded per RFC 3986: unreserved characters (`A-Z a-z 0-9 - . _
//! ~`) pass through and every other UTF-8 byte is escaped, with space as `%20`.
//! Invariants:
//! - `qt` is whole milliseconds since capture and never negative.
//! - `z` is a non-negative 31-bit integer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::Rng;
use time::OffsetDateTime;
use url::form_urlencoded;

use crate::hit::Hit;
use crate::params::HitParams;
use crate::transport::HttpMethod;
use crate::transport::TransportRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters kept from a single parameter value.
///
/// The limit counts Unicode scalar values, so a value containing characters
/// outside the Basic Multilingual Plane can keep up to twice as many UTF-16
/// code units as a limit counted in UTF-16 would allow.
pub const MAX_VALUE_CHARS: usize = 65_519;
/// Queue time parameter name.
pub const QUEUE_TIME_KEY: &str = "qt";
/// Cache buster parameter name.
pub const CACHE_BUSTER_KEY: &str = "z";

// ============================================================================
// SECTION: Endpoints
// ============================================================================

/// Collection endpoint selected by the secure and debug flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectEndpoint {
    /// HTTPS production endpoint.
    Secure,
    /// HTTP production endpoint.
    Insecure,
    /// HTTPS validation endpoint.
    SecureDebug,
    /// HTTP validation endpoint.
    InsecureDebug,
}

impl CollectEndpoint {
    /// Selects the endpoint for the given flags.
    #[must_use]
    pub const fn select(secure: bool, debug: bool) -> Self {
        match (secure, debug) {
            (true, false) => Self::Secure,
            (false, false) => Self::Insecure,
            (true, true) => Self::SecureDebug,
            (false, true) => Self::InsecureDebug,
        }
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secure => "https://ssl.google-analytics.com/collect",
            Self::Insecure => "http://www.google-analytics.com/collect",
            Self::SecureDebug => "https://ssl.google-analytics.com/debug/collect",
            Self::InsecureDebug => "http://www.google-analytics.com/debug/collect",
        }
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Returns at most [`MAX_VALUE_CHARS`] leading characters of `value`.
#[must_use]
pub fn truncate_value(value: &str) -> &str {
    match value.char_indices().nth(MAX_VALUE_CHARS) {
        Some((cut, _)) => &value[.. cut],
        None => value,
    }
}

/// Percent-encodes a value per RFC 3986 after truncation.
#[must_use]
pub fn encode_value(value: &str) -> String {
    let encoded: String =
        form_urlencoded::byte_serialize(truncate_value(value).as_bytes()).collect();
    // form encoding differs from RFC 3986 in three characters.
    encoded.replace('+', "%20").replace('*', "%2A").replace("%7E", "~")
}

/// Encodes parameters as `key=value` pairs joined by `&`.
#[must_use]
pub fn encode_params(params: &HitParams) -> String {
    let mut payload = String::new();
    for (key, value) in params.iter() {
        if !payload.is_empty() {
            payload.push('&');
        }
        payload.push_str(key);
        payload.push('=');
        payload.push_str(&encode_value(value));
    }
    payload
}

/// Returns a random non-negative 31-bit cache buster.
#[must_use]
pub fn cache_buster() -> i32 {
    rand::thread_rng().gen_range(0 .. i32::MAX)
}

/// Copies the hit parameters and adds `qt` and, when given, `z`.
#[must_use]
pub fn materialize(hit: &Hit, now: OffsetDateTime, cache_buster: Option<i32>) -> HitParams {
    let mut params = hit.params().clone();
    params.insert(QUEUE_TIME_KEY, hit.queue_time_millis(now).to_string());
    params.insert_opt(CACHE_BUSTER_KEY, cache_buster.map(|value| value.to_string()));
    params
}

/// Builds the transport request for encoded parameters.
#[must_use]
pub fn build_request(
    endpoint: CollectEndpoint,
    method: HttpMethod,
    params: &HitParams,
    user_agent: Option<&str>,
) -> TransportRequest {
    let payload = encode_params(params);
    let url = match method {
        HttpMethod::Post => endpoint.as_str().to_string(),
        HttpMethod::Get => format!("{}?{payload}", endpoint.as_str()),
    };
    TransportRequest {
        url,
        method,
        payload,
        user_agent: user_agent.map(str::to_string),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
