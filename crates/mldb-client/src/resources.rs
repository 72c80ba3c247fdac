// crates/mldb-client/src/resources.rs
// ============================================================================
// Module: Functions and Procedures
// Description: Registration and execution of server-side resources.
// Purpose: Type the `{type, params}` payloads and procedure run results.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Functions and procedures share one registration shape,
//! [`ResourceConfig`]. Procedures are created and run in two separate calls;
//! a run answers with a [`ProcedureRun`] whose `status` object carries the
//! procedure-specific results (for example the AUC of a classifier test).
//!
//! The registration helpers return the raw [`PerformResult`] so callers can
//! assert on the status code themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::client::Method;
use crate::client::MldbClient;
use crate::client::MldbError;
use crate::client::PerformResult;
use crate::dataset::SPARSE_MUTABLE;

// ============================================================================
// SECTION: Payload Types
// ============================================================================

/// Registration payload for a function or procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceConfig {
    /// Resource type, for example `transform` or `classifier.train`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific parameters.
    pub params: Value,
}

impl ResourceConfig {
    /// Creates a payload from a type and parameter object.
    #[must_use]
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

/// Reference to a dataset by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRef {
    /// Dataset identifier.
    pub id: String,
}

impl DatasetRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
        }
    }
}

/// Output dataset declaration for procedures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDataset {
    /// Dataset identifier.
    pub id: String,
    /// Storage engine tag.
    #[serde(rename = "type")]
    pub kind: String,
}

impl OutputDataset {
    /// Declares a `sparse.mutable` output dataset.
    #[must_use]
    pub fn sparse_mutable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: SPARSE_MUTABLE.to_string(),
        }
    }
}

/// Structured select statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectQuery {
    /// Select expression.
    pub select: String,
    /// Source dataset.
    pub from: DatasetRef,
    /// Optional filter expression.
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    /// Optional ordering expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Optional row limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl SelectQuery {
    /// Creates an unfiltered select over one dataset.
    #[must_use]
    pub fn new(select: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            from: DatasetRef::new(from),
            where_clause: None,
            order_by: None,
            limit: None,
        }
    }

    /// Adds a filter expression.
    #[must_use]
    pub fn filter(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }
}

/// Procedure input: a full SQL statement or a structured select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InputData {
    /// Complete SQL statement.
    Sql(String),
    /// Structured select.
    Select(SelectQuery),
}

impl From<SelectQuery> for InputData {
    fn from(value: SelectQuery) -> Self {
        Self::Select(value)
    }
}

impl From<&str> for InputData {
    fn from(value: &str) -> Self {
        Self::Sql(value.to_string())
    }
}

impl From<String> for InputData {
    fn from(value: String) -> Self {
        Self::Sql(value)
    }
}

/// Decoded response of `POST /v1/procedures/{id}/runs`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcedureRun {
    /// Run identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Run state, for example `finished`.
    #[serde(default)]
    pub state: Option<String>,
    /// Procedure-specific results.
    #[serde(default)]
    pub status: Value,
}

impl ProcedureRun {
    /// Decodes a successful run result.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::Status`] for an error status and
    /// [`MldbError::Json`] when the body is not a run object.
    pub fn from_result(result: &PerformResult) -> Result<Self, MldbError> {
        if !result.is_success() {
            return Err(result.clone().into_status_error());
        }
        serde_json::from_value(result.response.clone())
            .map_err(|err| MldbError::Json(format!("invalid procedure run payload: {err}")))
    }

    /// Returns a numeric field of `status`.
    #[must_use]
    pub fn status_number(&self, key: &str) -> Option<f64> {
        self.status.get(key).and_then(Value::as_f64)
    }
}

// ============================================================================
// SECTION: Client Operations
// ============================================================================

impl MldbClient {
    /// Registers a function with `PUT /v1/functions/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError`] on transport failure; rejections come back in
    /// the [`PerformResult`].
    pub fn put_function(
        &self,
        id: &str,
        config: &ResourceConfig,
    ) -> Result<PerformResult, MldbError> {
        self.put_resource("functions", id, config)
    }

    /// Registers a procedure with `PUT /v1/procedures/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError`] on transport failure; rejections come back in
    /// the [`PerformResult`].
    pub fn put_procedure(
        &self,
        id: &str,
        config: &ResourceConfig,
    ) -> Result<PerformResult, MldbError> {
        self.put_resource("procedures", id, config)
    }

    /// Runs a registered procedure with `POST /v1/procedures/{id}/runs`.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError`] on transport failure; rejections come back in
    /// the [`PerformResult`].
    pub fn run_procedure(&self, id: &str) -> Result<PerformResult, MldbError> {
        self.perform_segments(Method::Post, &["v1", "procedures", id, "runs"], &[], None)
    }

    /// Shared `PUT` for functions and procedures.
    fn put_resource(
        &self,
        collection: &str,
        id: &str,
        config: &ResourceConfig,
    ) -> Result<PerformResult, MldbError> {
        if id.is_empty() {
            return Err(MldbError::InvalidRequest(format!("{collection} id must not be empty")));
        }
        let body = serde_json::to_value(config)
            .map_err(|err| MldbError::Json(format!("resource serialization failed: {err}")))?;
        self.perform_segments(Method::Put, &["v1", collection, id], &[], Some(&body))
    }
}
