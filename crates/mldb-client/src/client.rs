// crates/mldb-client/src/client.rs
// ============================================================================
// Module: MLDB HTTP Client
// Description: Blocking request dispatch for the MLDB REST API.
// Purpose: Issue one verb+path+query+body call and return a decoded result.
// Dependencies: reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`MldbClient::perform`] is the single entry point for every request. It
//! percent-encodes path segments, form-encodes query pairs, enforces the
//! response size limit, decodes the body into JSON and records both a
//! transcript entry and a [`RequestLogEvent`].
//!
//! HTTP error statuses are not errors at this layer: they come back inside
//! [`PerformResult`] so callers decide how to assert on them. Only transport
//! and decoding failures produce [`MldbError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Instant;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::log::LogSink;
use crate::log::RequestLogEvent;
use crate::log::RequestLogEventParams;
use crate::log::sink_from_config;

// ============================================================================
// SECTION: Types
// ============================================================================

/// HTTP methods used against the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`.
    Get,
    /// `PUT`.
    Put,
    /// `POST`.
    Post,
    /// `DELETE`.
    Delete,
}

impl Method {
    /// Returns the canonical method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }

    /// Maps to the reqwest method.
    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Put => reqwest::Method::PUT,
            Self::Post => reqwest::Method::POST,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// MLDB client errors.
///
/// # Invariants
/// - String payloads may include untrusted server text.
#[derive(Debug, Error)]
pub enum MldbError {
    /// Configuration error.
    #[error("mldb client config error: {0}")]
    Config(String),
    /// Transport error; no usable response was received.
    #[error("mldb transport error: {0}")]
    Transport(String),
    /// JSON serialization or decoding error.
    #[error("mldb json error: {0}")]
    Json(String),
    /// The service rejected the request.
    #[error("mldb returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the service.
        message: String,
    },
    /// Response size exceeds limits.
    #[error("mldb response exceeds size limit ({actual} > {limit})")]
    ResponseTooLarge {
        /// Observed size in bytes.
        actual: usize,
        /// Maximum size in bytes.
        limit: usize,
    },
    /// The request was rejected before being sent.
    #[error("invalid mldb request: {0}")]
    InvalidRequest(String),
}

/// Result of one request.
///
/// # Invariants
/// - `response` is always decoded: JSON bodies become their value, non-JSON
///   bodies become a JSON string and empty bodies become `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformResult {
    /// HTTP status code.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Decoded response body.
    pub response: Value,
}

impl PerformResult {
    /// Returns true when the status code is below 400.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code < 400
    }

    /// Returns the service error message, falling back to the raw body.
    #[must_use]
    pub fn error_message(&self) -> String {
        match &self.response {
            Value::Object(map) => map
                .get("error")
                .and_then(Value::as_str)
                .map_or_else(|| self.response.to_string(), str::to_string),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }

    /// Converts the result into a [`MldbError::Status`].
    #[must_use]
    pub fn into_status_error(self) -> MldbError {
        MldbError::Status {
            status: self.status_code,
            message: self.error_message(),
        }
    }

    /// Passes the result through when the status code is below 400.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::Status`] otherwise.
    pub fn require_success(self) -> Result<Self, MldbError> {
        if self.is_success() { Ok(self) } else { Err(self.into_status_error()) }
    }

    /// Passes the result through when the status code matches exactly.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::Status`] otherwise.
    pub fn require_status(self, expected: u16) -> Result<Self, MldbError> {
        if self.status_code == expected { Ok(self) } else { Err(self.into_status_error()) }
    }
}

/// One request/response pair captured by the client.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    /// Monotonic sequence number, starting at 1.
    pub sequence: u64,
    /// HTTP method.
    pub method: Method,
    /// Request path relative to the service root.
    pub path: String,
    /// Query parameters in request order.
    pub query: Vec<(String, String)>,
    /// Request body, when one was sent.
    pub request: Option<Value>,
    /// Status code, when a response was received.
    pub status_code: Option<u16>,
    /// Decoded response body, when a response was received.
    pub response: Option<Value>,
    /// Error text for failed requests.
    pub error: Option<String>,
}

/// Blocking MLDB client.
///
/// # Invariants
/// - `base_url` has already passed [`ClientConfig::validate`].
/// - Cloned clients share the transcript and log sink.
#[derive(Clone)]
pub struct MldbClient {
    /// Service root.
    base_url: Url,
    /// Reqwest client instance.
    client: Client,
    /// Maximum accepted response body size.
    max_response_bytes: usize,
    /// Rows buffered per dataset before a flush.
    row_batch_size: usize,
    /// Destination for structured log events.
    log: Arc<dyn LogSink>,
    /// Captured request/response pairs.
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl std::fmt::Debug for MldbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MldbClient")
            .field("base_url", &self.base_url.as_str())
            .field("max_response_bytes", &self.max_response_bytes)
            .field("row_batch_size", &self.row_batch_size)
            .finish_non_exhaustive()
    }
}

impl MldbClient {
    /// Builds a client with the log sink selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::Config`] when the configuration is invalid or the
    /// log sink or HTTP client cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self, MldbError> {
        let log = sink_from_config(&config.log)
            .map_err(|err| MldbError::Config(format!("log sink: {err}")))?;
        Self::with_log_sink(config, log)
    }

    /// Builds a client that routes events to the provided sink.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::Config`] when the configuration is invalid or the
    /// HTTP client cannot be created.
    pub fn with_log_sink(config: &ClientConfig, log: Arc<dyn LogSink>) -> Result<Self, MldbError> {
        config.validate().map_err(|err| MldbError::Config(err.to_string()))?;
        let base_url =
            config.parsed_base_url().map_err(|err| MldbError::Config(err.to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| MldbError::Config(format!("http client build failed: {err}")))?;
        Ok(Self {
            base_url,
            client,
            max_response_bytes: config.max_response_bytes,
            row_batch_size: config.row_batch_size,
            log,
            transcript: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Returns the service root.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the number of rows buffered per dataset before a flush.
    #[must_use]
    pub const fn row_batch_size(&self) -> usize {
        self.row_batch_size
    }

    /// Returns the log sink shared by this client.
    #[must_use]
    pub fn log_sink(&self) -> &Arc<dyn LogSink> {
        &self.log
    }

    /// Returns a snapshot of the transcript entries.
    #[must_use]
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Issues one request against the service.
    ///
    /// `path` is split on `/`; each non-empty segment is percent-encoded, so
    /// resource ids are passed raw (for example `/v1/datasets/données`).
    ///
    /// # Errors
    ///
    /// Returns [`MldbError`] when the request cannot be built or sent, or the
    /// response exceeds the size limit. HTTP error statuses are returned in
    /// the [`PerformResult`].
    pub fn perform(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<PerformResult, MldbError> {
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        self.perform_segments(method, &segments, query, body)
    }

    /// Issues one request addressed by explicit path segments.
    ///
    /// Segments may contain `/`; they are encoded as a single segment.
    ///
    /// # Errors
    ///
    /// Same as [`MldbClient::perform`].
    pub fn perform_segments(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<PerformResult, MldbError> {
        if segments.is_empty() {
            return Err(MldbError::InvalidRequest("request path must not be empty".to_string()));
        }
        let url = self.endpoint(segments, query)?;
        let display_path = format!("/{}", segments.join("/"));
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| MldbError::Json(format!("request serialization failed: {err}")))?;
        let request_bytes = payload.as_ref().map_or(0, Vec::len);

        let mut builder =
            self.client.request(method.to_reqwest(), url).header(ACCEPT, "application/json");
        if let Some(payload) = payload {
            builder = builder.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let started = Instant::now();
        let outcome = builder
            .send()
            .map_err(|err| MldbError::Transport(err.to_string()))
            .and_then(|mut response| {
                let status = response.status().as_u16();
                read_response_limited(&mut response, self.max_response_bytes)
                    .map(|bytes| (status, bytes))
            });
        let latency_ms = started.elapsed().as_millis();

        let owned_query: Vec<(String, String)> =
            query.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
        match outcome {
            Ok((status_code, bytes)) => {
                let response = decode_body(&bytes);
                self.log.record_request(&RequestLogEvent::new(RequestLogEventParams {
                    method,
                    path: display_path.clone(),
                    status_code: Some(status_code),
                    request_bytes,
                    response_bytes: bytes.len(),
                    latency_ms,
                    error: None,
                }));
                self.push_transcript(TranscriptEntry {
                    sequence: 0,
                    method,
                    path: display_path,
                    query: owned_query,
                    request: body.cloned(),
                    status_code: Some(status_code),
                    response: Some(response.clone()),
                    error: None,
                });
                Ok(PerformResult {
                    status_code,
                    response,
                })
            }
            Err(err) => {
                self.log.record_request(&RequestLogEvent::new(RequestLogEventParams {
                    method,
                    path: display_path.clone(),
                    status_code: None,
                    request_bytes,
                    response_bytes: 0,
                    latency_ms,
                    error: Some(err.to_string()),
                }));
                self.push_transcript(TranscriptEntry {
                    sequence: 0,
                    method,
                    path: display_path,
                    query: owned_query,
                    request: body.cloned(),
                    status_code: None,
                    response: None,
                    error: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }

    /// Sends `GET /v1/ping`.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError`] when the service is unreachable or answers with
    /// an error status.
    pub fn ping(&self) -> Result<(), MldbError> {
        self.perform(Method::Get, "/v1/ping", &[], None)?.require_success().map(|_| ())
    }

    /// Builds the request URL from the service root, segments and query.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, MldbError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| MldbError::Config("base_url cannot be a base".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Appends a transcript entry with the next sequence number.
    fn push_transcript(&self, mut entry: TranscriptEntry) {
        let mut entries = self.transcript.lock().unwrap_or_else(PoisonError::into_inner);
        entry.sequence = u64::try_from(entries.len()).unwrap_or(u64::MAX).saturating_add(1);
        entries.push(entry);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes a response body into JSON.
pub(crate) fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, MldbError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| MldbError::Config("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(MldbError::ResponseTooLarge {
            actual: usize::try_from(expected).unwrap_or(usize::MAX),
            limit: max_bytes,
        });
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle
        .read_to_end(&mut buf)
        .map_err(|err| MldbError::Transport(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(MldbError::ResponseTooLarge {
            actual: buf.len(),
            limit: max_bytes,
        });
    }
    if let Some(expected) = expected_len {
        let expected = usize::try_from(expected)
            .map_err(|_| MldbError::Transport("invalid response length".to_string()))?;
        if buf.len() < expected {
            return Err(MldbError::Transport("response truncated".to_string()));
        }
    }
    Ok(buf)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
