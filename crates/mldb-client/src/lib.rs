// crates/mldb-client/src/lib.rs
// ============================================================================
// Module: MLDB Client Library
// Description: Blocking HTTP client for the MLDB REST API.
// Purpose: Provide typed dataset, function, procedure, and query calls.
// Dependencies: reqwest, serde, serde_json, thiserror, time, toml
// ============================================================================

//! ## Overview
//! `mldb-client` talks to a running MLDB service over its `/v1` REST surface.
//! Every call funnels through [`MldbClient::perform`], which issues one
//! blocking request, decodes the body into JSON, records a transcript entry
//! and emits a structured log event. Typed helpers for datasets, functions,
//! procedures and queries are layered on top.
//!
//! Invariants:
//! - Requests are never retried; transport failures surface immediately.
//! - Response bodies are size-limited and always decoded to a JSON value.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod config;
pub mod dataset;
pub mod log;
pub mod query;
pub mod readiness;
pub mod resources;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::Method;
pub use client::MldbClient;
pub use client::MldbError;
pub use client::PerformResult;
pub use client::TranscriptEntry;
pub use config::ClientConfig;
pub use config::ClientEnv;
pub use config::ConfigError;
pub use config::LogConfig;
pub use config::LogSinkKind;
pub use dataset::Cell;
pub use dataset::CellTimestamp;
pub use dataset::CellValue;
pub use dataset::CommitReceipt;
pub use dataset::Dataset;
pub use dataset::DatasetConfig;
pub use dataset::Row;
pub use dataset::RowBuffer;
pub use log::FileLogSink;
pub use log::LogSink;
pub use log::MemoryLogSink;
pub use log::MessageLogEvent;
pub use log::NoopLogSink;
pub use log::RequestLogEvent;
pub use log::StderrLogSink;
pub use query::QueryColumn;
pub use query::QueryRow;
pub use readiness::wait_for_ready;
pub use resources::DatasetRef;
pub use resources::InputData;
pub use resources::OutputDataset;
pub use resources::ProcedureRun;
pub use resources::ResourceConfig;
pub use resources::SelectQuery;
