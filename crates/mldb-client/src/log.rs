// crates/mldb-client/src/log.rs
// ============================================================================
// Module: Structured Logging
// Description: JSON-line log events for MLDB requests and scenario messages.
// Purpose: Emit structured logs without hard dependencies on a logging stack.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every request issued by [`crate::MldbClient`] produces a
//! [`RequestLogEvent`]; scenario code records free-form progress through
//! [`MessageLogEvent`]. Events are routed to a [`LogSink`] chosen from
//! configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

use crate::client::Method;
use crate::config::LogConfig;
use crate::config::LogSinkKind;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// The service answered with a status below 400.
    Ok,
    /// The service answered with a status of 400 or above.
    Rejected,
    /// No usable response was received.
    TransportError,
}

/// Log event emitted for each request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP method.
    pub method: Method,
    /// Request path relative to the service root.
    pub path: String,
    /// Status code when a response was received.
    pub status_code: Option<u16>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u128,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// Transport error text when the request failed.
    pub error: Option<String>,
}

/// Inputs required to construct a request log event.
pub struct RequestLogEventParams {
    /// HTTP method.
    pub method: Method,
    /// Request path relative to the service root.
    pub path: String,
    /// Status code when a response was received.
    pub status_code: Option<u16>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u128,
    /// Transport error text when the request failed.
    pub error: Option<String>,
}

impl RequestLogEvent {
    /// Creates a request event stamped with the current time.
    #[must_use]
    pub fn new(params: RequestLogEventParams) -> Self {
        let outcome = match (params.status_code, &params.error) {
            (Some(status), None) if status < 400 => RequestOutcome::Ok,
            (Some(_), None) => RequestOutcome::Rejected,
            _ => RequestOutcome::TransportError,
        };
        Self {
            event: "mldb_request",
            timestamp_ms: now_millis(),
            method: params.method,
            path: params.path,
            status_code: params.status_code,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
            latency_ms: params.latency_ms,
            outcome,
            error: params.error,
        }
    }
}

/// Free-form progress message recorded by a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct MessageLogEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Scenario emitting the message.
    pub scenario: String,
    /// Message text.
    pub message: String,
    /// Optional structured detail, typically a service response.
    pub detail: Option<Value>,
}

impl MessageLogEvent {
    /// Creates a message event stamped with the current time.
    #[must_use]
    pub fn new(scenario: &str, message: &str, detail: Option<Value>) -> Self {
        Self {
            event: "scenario_log",
            timestamp_ms: now_millis(),
            scenario: scenario.to_string(),
            message: message.to_string(),
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for structured log events.
pub trait LogSink: Send + Sync {
    /// Records a request event.
    fn record_request(&self, event: &RequestLogEvent);

    /// Records a scenario message.
    fn record_message(&self, _event: &MessageLogEvent) {}
}

/// Sink that writes JSON lines to stderr.
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn record_request(&self, event: &RequestLogEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_message(&self, event: &MessageLogEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileLogSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileLogSink {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Serializes and appends one event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl LogSink for FileLogSink {
    fn record_request(&self, event: &RequestLogEvent) {
        self.append(event);
    }

    fn record_message(&self, event: &MessageLogEvent) {
        self.append(event);
    }
}

/// Sink that discards every event.
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn record_request(&self, _event: &RequestLogEvent) {}

    fn record_message(&self, _event: &MessageLogEvent) {}
}

/// Sink that keeps serialized events in memory.
#[derive(Default)]
pub struct MemoryLogSink {
    /// Captured events in arrival order.
    events: Mutex<Vec<Value>>,
}

impl MemoryLogSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of captured events.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map_or_else(|_| Vec::new(), |events| events.clone())
    }

    /// Stores one event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl LogSink for MemoryLogSink {
    fn record_request(&self, event: &RequestLogEvent) {
        self.push(event);
    }

    fn record_message(&self, event: &MessageLogEvent) {
        self.push(event);
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the file sink cannot open its path.
pub fn sink_from_config(config: &LogConfig) -> io::Result<Arc<dyn LogSink>> {
    match config.sink {
        LogSinkKind::Stderr => Ok(Arc::new(StderrLogSink)),
        LogSinkKind::None => Ok(Arc::new(NoopLogSink)),
        LogSinkKind::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "log.path is required for file sink")
            })?;
            Ok(Arc::new(FileLogSink::new(path)?))
        }
    }
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
