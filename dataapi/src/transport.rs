//! Outbound HTTP transport used by the `Post`, `Get`, and `ParallelPost`
//! built-ins.
//!
//! The interpreter only sees the [`Transport`] trait, so tests can script
//! responses without opening sockets.  [`UreqTransport`] is the blocking
//! implementation used by the binary; it is called from the blocking pool,
//! never from an async task.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, warn};

/// Request headers, keyed by name.  Later duplicates overwrite earlier ones.
pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The server answered with a non-2xx status.  The body is appended to
    /// the message when present.
    #[error("failed to send {method} request to {url}{}", body_suffix(.body))]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },
    /// The request never produced a response (DNS, connect, TLS, ...).
    #[error("failed to send {method} request to {url}: {reason}")]
    Connection {
        method: Method,
        url: String,
        reason: String,
    },
    #[error("failed to read response from {url}: {reason}")]
    Body { url: String, reason: String },
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

/// One outbound request/response exchange.
pub trait Transport: Send + Sync {
    /// Send a request and return the raw response body.
    ///
    /// `body` is encoded as JSON for `POST` and ignored for `GET`.
    fn send(
        &self,
        url: &str,
        headers: &Headers,
        method: Method,
        body: Option<&Json>,
    ) -> Result<String, TransportError>;
}

// ── ureq ──────────────────────────────────────────────────────────────────────

/// Blocking transport backed by a shared [`ureq::Agent`].
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
        }
    }

    /// Transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(
        &self,
        url: &str,
        headers: &Headers,
        method: Method,
        body: Option<&Json>,
    ) -> Result<String, TransportError> {
        debug!(%method, url, "sending request");
        let mut request = match method {
            Method::Get => self.agent.get(url),
            Method::Post => self.agent.post(url),
        };
        for (key, value) in headers {
            request = request.set(key, value);
        }

        let result = match (method, body) {
            (Method::Post, Some(json)) => request.send_json(json),
            (Method::Post, None) => request.send_string(""),
            (Method::Get, _) => request.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                warn!(%method, url, status, "request rejected");
                return Err(TransportError::Status {
                    method,
                    url: url.to_owned(),
                    status,
                    body,
                });
            }
            Err(e) => {
                warn!(%method, url, error = %e, "request failed");
                return Err(TransportError::Connection {
                    method,
                    url: url.to_owned(),
                    reason: e.to_string(),
                });
            }
        };

        response.into_string().map_err(|e| TransportError::Body {
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
