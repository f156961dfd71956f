//! HTTP API around the script runner.
//!
//! | Route | Response |
//! |-------|----------|
//! | `POST /evaluate` `{"File": "<path>"}` | `200 {"Failures": [...], "Successes": [...]}` |
//! | `GET /readiness`, `GET /liveness` | `200 {"Status": "ok"}` |
//!
//! Malformed requests get `400 {"Error": "..."}`.  Script failures are part
//! of a `200` body and never produce a 5xx.
//!
//! Routing and request decoding live in [`Service::handle`], which does no
//! I/O.  [`serve`] wraps it in a tokio accept loop that speaks just enough
//! HTTP/1.1 for one request per connection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::script::Interpreter;
use crate::scripts::ScriptFs;
use crate::transport::Transport;

const MAX_HEAD: usize = 64 * 1024;
const MAX_BODY: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("request body exceeds {MAX_BODY} bytes")]
    PayloadTooLarge,
    #[error("request timed out")]
    Timeout,
    #[error("evaluation task failed: {0}")]
    Join(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::PayloadTooLarge => 413,
            ServiceError::Timeout => 408,
            ServiceError::Join(_) | ServiceError::Io(_) => 500,
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// Outcome of one `evaluate` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Results {
    pub failures: Vec<String>,
    pub successes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EvaluateRequest {
    #[serde(rename = "File")]
    file: String,
}

/// A response ready to be written: status code and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Json,
}

impl Response {
    fn ok(body: Json) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "Error": message.into() }),
        }
    }

    /// Serialise as a complete HTTP/1.1 response.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.to_string();
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            reason(self.status),
            body.len(),
            body
        )
        .into_bytes()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

/// Evaluates scripts on behalf of HTTP and command-line callers.
pub struct Service {
    transport: Arc<dyn Transport>,
    scripts: Arc<dyn ScriptFs>,
}

impl Service {
    pub fn new(transport: Arc<dyn Transport>, scripts: Arc<dyn ScriptFs>) -> Self {
        Self { transport, scripts }
    }

    /// Run `file` in a fresh environment and classify its report.
    ///
    /// When nothing failed, `"<file>: passed"` is appended to the
    /// successes.
    pub fn evaluate(&self, file: &str) -> Results {
        let mut interp = Interpreter::new(Arc::clone(&self.transport), Arc::clone(&self.scripts));
        let report = interp.run(file);
        let failures = report.failures();
        let mut successes = report.successes();
        if failures.is_empty() {
            successes.push(format!("{file}: passed"));
        }
        info!(file, failures = failures.len(), "evaluation finished");
        Results {
            failures,
            successes,
        }
    }

    /// Route one request.  Blocks for as long as the script runs.
    pub fn handle(&self, method: &str, path: &str, body: &[u8]) -> Response {
        let path = path.split('?').next().unwrap_or(path);
        match (method, path) {
            ("GET", "/readiness") | ("GET", "/liveness") => Response::ok(json!({ "Status": "ok" })),
            ("POST", "/evaluate") => match decode_request(body) {
                Ok(file) => {
                    let results = self.evaluate(&file);
                    Response::ok(json!({
                        "Failures": results.failures,
                        "Successes": results.successes,
                    }))
                }
                Err(e) => Response::error(e.status(), e.to_string()),
            },
            (_, "/readiness" | "/liveness" | "/evaluate") => {
                Response::error(405, format!("method {method} not allowed on {path}"))
            }
            _ => Response::error(404, format!("no route for {path}")),
        }
    }
}

fn decode_request(body: &[u8]) -> Result<String, ServiceError> {
    let req: EvaluateRequest = serde_json::from_slice(body)
        .map_err(|e| ServiceError::BadRequest(format!("error evaluate/decode: {e}")))?;
    if req.file.trim().is_empty() {
        return Err(ServiceError::BadRequest("File is a required field".into()));
    }
    Ok(req.file)
}

// ── HTTP framing ──────────────────────────────────────────────────────────────

/// Request line and the headers we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub method: String,
    pub path: String,
    pub content_length: usize,
}

/// Parse the request line and headers (everything before the blank line).
pub fn parse_head(head: &[u8]) -> Result<Head, ServiceError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| ServiceError::BadRequest("request head is not UTF-8".into()))?;
    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ServiceError::BadRequest(format!(
            "malformed request line: {request_line:?}"
        )));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(ServiceError::BadRequest(format!("unsupported version {version}")));
    }

    let mut content_length = 0;
    for line in lines.filter(|l| !l.is_empty()) {
        let Some((name, value)) = line.split_once(':') else {
            return Err(ServiceError::BadRequest(format!("malformed header: {line:?}")));
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse().map_err(|_| {
                ServiceError::BadRequest(format!("invalid Content-Length: {}", value.trim()))
            })?;
        }
    }
    if content_length > MAX_BODY {
        return Err(ServiceError::PayloadTooLarge);
    }

    Ok(Head {
        method: method.to_owned(),
        path: path.to_owned(),
        content_length,
    })
}

/// Read one request: head, then exactly `Content-Length` body bytes.
pub async fn read_request<R: AsyncRead + Unpin>(stream: &mut R) -> Result<(Head, Vec<u8>), ServiceError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > MAX_HEAD {
            return Err(ServiceError::BadRequest("request head too large".into()));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ServiceError::BadRequest("connection closed mid-request".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = parse_head(&buf[..head_end])?;
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < head.content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ServiceError::BadRequest("connection closed mid-body".into()));
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(head.content_length);
    Ok((head, body))
}

async fn handle_connection(
    service: Arc<Service>,
    mut stream: TcpStream,
    read_timeout: Duration,
) -> Result<(), ServiceError> {
    let request = match tokio::time::timeout(read_timeout, read_request(&mut stream)).await {
        Ok(r) => r,
        Err(_) => Err(ServiceError::Timeout),
    };

    let response = match request {
        Ok((head, body)) => {
            debug!(method = %head.method, path = %head.path, "request");
            // Built-ins block (transport, Sleep), so scripts run off the
            // async workers.
            let svc = Arc::clone(&service);
            let response =
                tokio::task::spawn_blocking(move || svc.handle(&head.method, &head.path, &body))
                    .await
                    .map_err(|e| ServiceError::Join(e.to_string()));
            match response {
                Ok(r) => r,
                Err(e) => Response::error(e.status(), e.to_string()),
            }
        }
        Err(ServiceError::Io(e)) => return Err(ServiceError::Io(e)),
        Err(e) => Response::error(e.status(), e.to_string()),
    };

    info!(status = response.status, "response");
    stream.write_all(&response.encode()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Accept connections until `shutdown` resolves, then give in-flight
/// requests `shutdown_timeout` to finish.
pub async fn serve(
    service: Arc<Service>,
    listener: TcpListener,
    read_timeout: Duration,
    shutdown_timeout: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServiceError> {
    let mut tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                debug!(%peer, "connection");
                let service = Arc::clone(&service);
                tasks.spawn(async move {
                    if let Err(e) = handle_connection(service, stream, read_timeout).await {
                        warn!(%peer, error = %e, "connection error");
                    }
                });
            }
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    info!(in_flight = tasks.len(), "shutting down");
    let drain = async { while tasks.join_next().await.is_some() {} };
    if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
        warn!("shutdown timed out, aborting in-flight requests");
        tasks.abort_all();
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
