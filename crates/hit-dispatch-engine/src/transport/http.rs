// crates/hit-dispatch-engine/src/transport/http.rs
// ============================================================================
// Module: HTTP Transport
// Description: reqwest-backed transport for collection requests.
// Purpose: Send encoded hits over HTTP(S) with bounded timeouts.
// Dependencies: hit-dispatch-core, reqwest
// ============================================================================

//! ## Overview
//! [`HttpTransport`] performs one request per call using a shared
//! `reqwest::Client`. POST requests carry the payload as a
//! `text/plain; charset=utf-8` body; GET requests already carry it in the URL.
//! Invariants:
//! - Redirects are not followed.
//! - Every request is bounded by the configured timeouts.
//! - Any HTTP status is returned as a response; classification is left to the
//!   caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use hit_dispatch_core::HttpMethod;
use hit_dispatch_core::Transport;
use hit_dispatch_core::TransportError;
use hit_dispatch_core::TransportRequest;
use hit_dispatch_core::TransportResponse;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type sent with POST payloads.
const PAYLOAD_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
/// Default total request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Timeouts applied by the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Total time allowed per request.
    pub timeout: Duration,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// reqwest-backed collection transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Shared HTTP client.
    client: Client,
}

impl HttpTransport {
    /// Builds a transport with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(HttpTransportConfig::default())
    }

    /// Builds a transport with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the HTTP client cannot be constructed.
    pub fn with_config(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(Self {
            client,
        })
    }

    /// Creates a transport with a preconfigured client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self {
            client,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self
                .client
                .post(&request.url)
                .header(CONTENT_TYPE, PAYLOAD_CONTENT_TYPE)
                .body(request.payload),
        };
        if let Some(user_agent) = request.user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }
        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| TransportError::Body(err.to_string()))?;
        Ok(TransportResponse {
            status,
            body,
        })
    }
}

/// Maps a reqwest error onto the transport taxonomy.
fn classify_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidUrl(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
