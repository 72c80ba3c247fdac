// crates/mldb-client/src/dataset.rs
// ============================================================================
// Module: Dataset Ingestion
// Description: Dataset creation, row recording, and commit.
// Purpose: Buffer rows locally and stream them to the service in batches.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! [`MldbClient::create_dataset`] registers a dataset and hands back a
//! [`Dataset`] handle. Rows recorded on the handle are buffered and flushed
//! through `POST /v1/datasets/{id}/multirows` whenever the buffer fills;
//! [`Dataset::commit`] flushes the remainder and commits, after which the
//! dataset becomes visible to queries.
//!
//! Invariants:
//! - Rows reach the service in the order they were recorded.
//! - Cells are passed through untouched, including duplicate column names.
//! - Rows still buffered when a handle is dropped without commit are lost.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::client::Method;
use crate::client::MldbClient;
use crate::client::MldbError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dataset type tag for the mutable sparse key-value table.
pub const SPARSE_MUTABLE: &str = "sparse.mutable";

// ============================================================================
// SECTION: Cell Types
// ============================================================================

/// A scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Explicit null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// UTF-8 string value.
    String(String),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Cell timestamp.
///
/// The service treats timestamps as opaque versioning tokens; ticks are sent
/// as integers and wall-clock instants as RFC 3339 strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTimestamp {
    /// Integer ordering token.
    Tick(i64),
    /// Wall-clock instant.
    At(OffsetDateTime),
}

impl CellTimestamp {
    /// Returns the current UTC instant.
    #[must_use]
    pub fn now() -> Self {
        Self::At(OffsetDateTime::now_utc())
    }
}

impl From<i64> for CellTimestamp {
    fn from(value: i64) -> Self {
        Self::Tick(value)
    }
}

impl From<i32> for CellTimestamp {
    fn from(value: i32) -> Self {
        Self::Tick(i64::from(value))
    }
}

impl From<OffsetDateTime> for CellTimestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self::At(value)
    }
}

impl Serialize for CellTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Tick(tick) => serializer.serialize_i64(*tick),
            Self::At(instant) => {
                let text = instant.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
        }
    }
}

/// One `(columnName, value, timestamp)` assignment.
///
/// Serialized as a three-element JSON array.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Column name.
    pub column: String,
    /// Cell value.
    pub value: CellValue,
    /// Cell timestamp.
    pub timestamp: CellTimestamp,
}

impl Cell {
    /// Creates a cell.
    #[must_use]
    pub fn new(
        column: impl Into<String>,
        value: impl Into<CellValue>,
        timestamp: impl Into<CellTimestamp>,
    ) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            timestamp: timestamp.into(),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.column, &self.value, &self.timestamp).serialize(serializer)
    }
}

/// A named row of cells, serialized as `[rowName, [cell, ...]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row identifier.
    pub row_name: String,
    /// Cells in recording order.
    pub cells: Vec<Cell>,
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.row_name, &self.cells).serialize(serializer)
    }
}

// ============================================================================
// SECTION: Row Buffer
// ============================================================================

/// Fixed-capacity row buffer.
///
/// # Invariants
/// - `capacity >= 1`.
/// - A batch is handed out exactly when `capacity` rows are pending.
#[derive(Debug)]
pub struct RowBuffer {
    /// Rows per batch.
    capacity: usize,
    /// Rows not yet handed out.
    pending: Vec<Row>,
}

impl RowBuffer {
    /// Creates a buffer; a zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            pending: Vec::new(),
        }
    }

    /// Adds a row and returns a full batch when the buffer fills.
    pub fn push(&mut self, row: Row) -> Option<Vec<Row>> {
        self.pending.push(row);
        if self.pending.len() >= self.capacity {
            return Some(std::mem::take(&mut self.pending));
        }
        None
    }

    /// Hands out any pending rows.
    pub fn drain(&mut self) -> Option<Vec<Row>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// Returns the number of pending rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// SECTION: Dataset Handle
// ============================================================================

/// Dataset creation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Storage engine tag, for example `sparse.mutable`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Dataset identifier.
    pub id: String,
}

impl DatasetConfig {
    /// Creates a `sparse.mutable` dataset config.
    #[must_use]
    pub fn sparse_mutable(id: impl Into<String>) -> Self {
        Self {
            kind: SPARSE_MUTABLE.to_string(),
            id: id.into(),
        }
    }
}

/// Summary returned by [`Dataset::commit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    /// Dataset identifier.
    pub id: String,
    /// Rows the service accepted before the commit.
    pub rows: usize,
}

/// Handle for recording rows into an uncommitted dataset.
///
/// # Invariants
/// - Once a flush is rejected the handle refuses further rows and the commit,
///   since the rejected batch is gone.
#[derive(Debug)]
pub struct Dataset {
    /// Client used for flushes and commit.
    client: MldbClient,
    /// Dataset identifier.
    id: String,
    /// Rows awaiting a flush.
    buffer: RowBuffer,
    /// Rows accepted by `multirows`.
    flushed: usize,
    /// Rows dropped with a rejected batch.
    lost: usize,
}

impl Dataset {
    /// Returns the dataset identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the number of rows accepted or still pending.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.flushed.saturating_add(self.buffer.len())
    }

    /// Records one row.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::InvalidRequest`] for an empty row name or when an
    /// earlier flush was rejected, or the flush error when the buffer fills
    /// and the batch is rejected.
    pub fn record_row(
        &mut self,
        row_name: impl Into<String>,
        cells: Vec<Cell>,
    ) -> Result<(), MldbError> {
        self.ensure_intact()?;
        let row_name = row_name.into();
        if row_name.is_empty() {
            return Err(MldbError::InvalidRequest("row name must not be empty".to_string()));
        }
        if let Some(batch) = self.buffer.push(Row {
            row_name,
            cells,
        }) {
            self.flush(&batch)?;
        }
        Ok(())
    }

    /// Flushes pending rows and commits the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::InvalidRequest`] when an earlier flush was
    /// rejected, or [`MldbError`] when the final flush or the commit is
    /// rejected.
    pub fn commit(mut self) -> Result<CommitReceipt, MldbError> {
        self.ensure_intact()?;
        if let Some(batch) = self.buffer.drain() {
            self.flush(&batch)?;
        }
        self.client
            .perform_segments(
                Method::Post,
                &["v1", "datasets", self.id.as_str(), "commit"],
                &[],
                None,
            )?
            .require_success()?;
        Ok(CommitReceipt {
            id: self.id,
            rows: self.flushed,
        })
    }

    /// Fails once a batch has been dropped.
    fn ensure_intact(&self) -> Result<(), MldbError> {
        if self.lost == 0 {
            return Ok(());
        }
        Err(MldbError::InvalidRequest(format!(
            "dataset '{}' lost {} rows in a rejected flush",
            self.id, self.lost
        )))
    }

    /// Sends one batch through `multirows`.
    fn flush(&mut self, batch: &[Row]) -> Result<(), MldbError> {
        let outcome = self.send_batch(batch);
        if outcome.is_ok() {
            self.flushed = self.flushed.saturating_add(batch.len());
        } else {
            self.lost = self.lost.saturating_add(batch.len());
        }
        outcome
    }

    /// Posts `batch` to the `multirows` route.
    fn send_batch(&self, batch: &[Row]) -> Result<(), MldbError> {
        let body = serde_json::to_value(batch)
            .map_err(|err| MldbError::Json(format!("row serialization failed: {err}")))?;
        self.client
            .perform_segments(
                Method::Post,
                &["v1", "datasets", self.id.as_str(), "multirows"],
                &[],
                Some(&body),
            )?
            .require_success()?;
        Ok(())
    }
}

impl MldbClient {
    /// Creates a dataset and returns a handle for recording rows.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::Status`] when the service rejects the dataset,
    /// for example because the id is already taken.
    pub fn create_dataset(&self, config: &DatasetConfig) -> Result<Dataset, MldbError> {
        if config.id.is_empty() {
            return Err(MldbError::InvalidRequest("dataset id must not be empty".to_string()));
        }
        let body = json!({ "type": config.kind });
        let segments = ["v1", "datasets", config.id.as_str()];
        self.perform_segments(Method::Put, &segments, &[], Some(&body))?.require_success()?;
        Ok(Dataset {
            client: self.clone(),
            id: config.id.clone(),
            buffer: RowBuffer::new(self.row_batch_size()),
            flushed: 0,
            lost: 0,
        })
    }
}
