// crates/hit-dispatch-core/src/transport.rs
// ============================================================================
// Module: Transport Interface
// Description: Single-request HTTP capability used by the dispatch engine.
// Purpose: Decouple dispatch scheduling from the HTTP client implementation.
// Dependencies: async-trait, thiserror
// ============================================================================

//! ## Overview
//! A [`Transport`] performs exactly one HTTP request per call and reports the
//! status and body, or a [`TransportError`] when no response was obtained.
//! Status classification belongs to the engine, not the transport.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// HTTP method used for a collection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Payload appended to the URL query.
    Get,
    /// Payload sent as the request body.
    Post,
}

impl HttpMethod {
    /// Returns the method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One collection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Fully qualified URL, including the query for GET requests.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Encoded payload; the body for POST, already in `url` for GET.
    pub payload: String,
    /// Optional user agent header.
    pub user_agent: Option<String>,
}

/// Response received from the collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl TransportResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when a request produced no HTTP response.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The URL could not be used.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    /// Connection or protocol failure.
    #[error("request failed: {0}")]
    Request(String),
    /// The request timed out.
    #[error("request timed out")]
    Timeout,
    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Performs one HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the endpoint's response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP response was obtained.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
